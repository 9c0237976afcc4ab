use clap::Parser;
use lit_review::app::{self, ConsoleProgress};
use lit_review::utils::{logger, validation::Validate};
use lit_review::{CliConfig, LocalStorage, Topic};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting lit-review CLI");

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let topic = match Topic::new(&config.topic) {
        Ok(topic) => topic,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path.clone());
    let engine = match app::build_engine(&config, storage) {
        Ok(engine) => engine
            .with_monitoring(config.monitor, config.monitor)
            .with_progress(Box::new(ConsoleProgress)),
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(app::exit_code(&e).max(1));
        }
    };

    println!("📝 Reviewing: {}", topic);
    let code = app::run_until_interrupted(&engine, &topic, &config.output_path).await;
    if code != 0 {
        std::process::exit(code);
    }
}
