use clap::Parser;
use lit_review::app::{self, ConsoleProgress};
use lit_review::domain::ports::ConfigProvider;
use lit_review::utils::{logger, validation::Validate};
use lit_review::{LocalStorage, SearchMethod, TomlConfig, Topic};

#[derive(Parser)]
#[command(name = "toml-review")]
#[command(about = "Draft a literature review described by a TOML file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "review.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the topic from config
    #[arg(long)]
    topic: Option<String>,

    /// Show what would be searched and generated without calling any service
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based literature review");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Some(topic) = &args.topic {
        config.review.topic = topic.clone();
        tracing::info!("🔧 Topic overridden to: {}", topic);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no service will be called");
        perform_dry_run(&config);
        return;
    }

    let topic = match Topic::new(config.topic()) {
        Ok(topic) => topic,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path());
    let engine = match app::build_engine(&config, storage) {
        Ok(engine) => engine
            .with_monitoring(monitor_enabled, monitor_enabled && config.system_stats_enabled())
            .with_progress(Box::new(ConsoleProgress)),
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(app::exit_code(&e).max(1));
        }
    };

    let code = app::run_until_interrupted(&engine, &topic, config.output_path()).await;
    if code != 0 {
        std::process::exit(code);
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Topic: {}", config.topic());
    println!("  Review type: {}", config.review_type());
    println!("  Provider: {}", config.llm_provider());
    println!("  Search method: {}", config.search_method());
    println!("  Minimum references: {}", config.min_references());
    println!("  Output: {}", config.output_path());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    use lit_review::adapters::ModelTier;
    use lit_review::core::keywords::SearchPlan;

    println!("🔍 Dry Run Analysis:");
    println!();

    let tier = ModelTier::for_review(config.llm_provider(), config.review_type());
    println!("🤖 Language Model:");
    println!("  Model: {}", tier.model);
    match tier.temperature {
        Some(t) => println!("  Temperature: {}", t),
        None => println!("  Temperature: provider default"),
    }
    if let Some(base_url) = config.llm_base_url() {
        println!("  Endpoint: {}", base_url);
    }

    println!();
    println!("📡 Paper Sources:");
    match config.search_method() {
        SearchMethod::PubMed => {
            let plan = SearchPlan::for_min_references(config.min_references());
            println!("  PubMed: {}", config.pubmed_base_url());
            println!(
                "  Queries: topic (up to {} results) + {} generated phrases x {} results",
                plan.topic_results, plan.phrases, plan.results_per_phrase
            );
            if config.include_scholar() {
                println!("  Scholar: {}", config.scholar_base_url());
            }
        }
        SearchMethod::Local => {
            println!("  Local store: {}", config.local_papers_dir());
        }
    }

    println!();
    println!("✍️ Review Structure:");
    println!("  Introduction, {} body sections, Conclusion", config.review_type().body_sections());
    println!(
        "  Papers selected: at least {} (up to {} with headroom)",
        config.min_references(),
        lit_review::core::selection::PaperSelector::new(config.min_references()).target()
    );

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
