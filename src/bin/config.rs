//! Schema Config CLI
//!
//! View and manage record store configuration.

use clap::{Parser, Subcommand};
use storefront_schemas::StorefrontConfig;

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "View and manage record store configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<String>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "storefront.toml")]
        output: String,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = StorefrontConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                println!("📋 Storefront Schema Configuration\n");
                println!("Store:");
                println!("  Unknown fields: {:?}", cfg.store.unknown_fields);

                println!("\nExport:");
                println!("  Directory: {:?}", cfg.export.output_dir);
                println!("  Format: {:?}", cfg.export.output_format);
                println!("  Manifest: {}", cfg.export.include_manifest);
            }
        }

        Commands::Init { output } => {
            StorefrontConfig::default().save(&output)?;
            println!("✅ Created config file: {}", output);
        }

        Commands::Validate { config } => match StorefrontConfig::load_from(config.as_deref()) {
            Ok(cfg) => {
                println!("✅ Configuration is valid");
                println!("   Unknown fields: {:?}", cfg.store.unknown_fields);
                println!("   Export directory: {:?}", cfg.export.output_dir);
            }
            Err(e) => {
                eprintln!("❌ Configuration error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
