use anyhow::Context;
use claude_usage_monitor::cli::Cli;
use claude_usage_monitor::config::{Config, ConfigLoader};
use claude_usage_monitor::logging::{setup_logging, LogTarget};
use claude_usage_monitor::monitor::{DataSource, LoadSettings, UsageMonitor};
use claude_usage_monitor::report::render_report;
use claude_usage_monitor::PricingProvider;
use chrono::Utc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    // Before any config is read, so its warnings are not lost
    let headless = cli.report
        || cli.export.is_some()
        || cli.init
        || cli.print_config
        || cli.check_config
        || !cfg!(feature = "tui");
    let log_target = if headless {
        LogTarget::Stderr
    } else {
        match ConfigLoader::log_path() {
            Ok(path) => LogTarget::File(path),
            Err(_) => LogTarget::Stderr,
        }
    };
    setup_logging(cli.debug, log_target)?;

    // Handle configuration commands
    if cli.init {
        let (path, created) = Config::init()?;
        if created {
            println!("Created config at {}", path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    if cli.print_config {
        let mut config = ConfigLoader::load();
        cli.apply_to(&mut config);
        config.print()?;
        return Ok(());
    }

    if cli.check_config {
        let config = Config::load()?;
        config.check()?;
        println!("✓ Configuration valid");
        return Ok(());
    }

    let mut config = ConfigLoader::load();
    cli.apply_to(&mut config);
    config.check()?;

    if cli.plan.is_some() {
        match config.save() {
            Ok(path) => info!("Saved plan {} to {}", config.plan.id(), path.display()),
            Err(e) => warn!("Could not save plan: {}", e),
        }
    }

    let pricing = if config.fetch_pricing {
        PricingProvider::with_remote_pricing().await
    } else {
        PricingProvider::new()
    };

    let settings = LoadSettings {
        source: DataSource::from_option(config.data_dir.clone()),
        pricing,
        session_duration: chrono::Duration::hours(i64::from(config.session_hours)),
        loader_threads: config.loader_threads,
    };

    if let Some(export_path) = &cli.export {
        let monitor = load_blocking(&settings).await?;
        let count = monitor
            .export_jsonl(export_path)
            .with_context(|| format!("exporting to {}", export_path.display()))?;
        println!("Exported {} entries to {}", count, export_path.display());
        return Ok(());
    }

    if headless {
        let monitor = load_blocking(&settings).await?;
        print!("{}", render_report(&monitor, Some(config.plan), Utc::now()));
        return Ok(());
    }

    #[cfg(feature = "tui")]
    {
        let searched_paths = match &settings.source {
            DataSource::Path(path) => vec![path.clone()],
            DataSource::Discover => claude_usage_monitor::utils::candidate_data_paths(),
        };
        let refresh = std::time::Duration::from_secs(config.refresh_interval_secs);
        claude_usage_monitor::ui::App::new(config.plan, settings, refresh, searched_paths)
            .run()
            .await?;
    }

    Ok(())
}

async fn load_blocking(settings: &LoadSettings) -> anyhow::Result<UsageMonitor> {
    let settings = settings.clone();
    let monitor = tokio::task::spawn_blocking(move || settings.load())
        .await
        .context("loader task panicked")??;
    Ok(monitor)
}
