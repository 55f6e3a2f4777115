use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use seatwatch::alerts::{AlertRequest, AlertService, DEFAULT_INTERVAL_MINUTES};
use seatwatch::api::{ApiClient, ApiError, DEFAULT_SEARCH_LIMIT};
use seatwatch::config::Config;
use seatwatch::dashboard::{CourseDetailsView, Dashboard};
use seatwatch::filter::{CourseFilter, SortKey, StatusFilter};
use seatwatch::poll::RefreshInterval;
use seatwatch::render;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend origin, overrides the configuration
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Search text matched against course code and title
    #[arg(short, long, default_value = "")]
    search: String,

    /// all, available, full or lab
    #[arg(long, default_value = "all")]
    status: StatusFilter,

    /// available, code or credits
    #[arg(long, default_value = "available")]
    sort: SortKey,
}

impl FilterArgs {
    fn into_filter(self) -> CourseFilter {
        CourseFilter::new(self.search, self.status, self.sort)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List courses once
    Courses(FilterArgs),
    /// Live dashboard. Each stdin line is a search, an empty line clears it
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
        /// 10s, 30s, 1m, 4m or 5m
        #[arg(short, long)]
        interval: Option<RefreshInterval>,
    },
    /// Show a section by course code
    Course { code: String },
    /// Live details of a section by id
    Details {
        id: i64,
        #[arg(short, long)]
        interval: Option<RefreshInterval>,
    },
    /// Search courses
    Search {
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },
    /// Overall availability statistics
    Stats,
    /// Manage seat alerts
    #[command(subcommand)]
    Alert(AlertCommand),
    /// Course data synchronization
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Ask the backend to check alerts and send notifications
    Notify,
}

#[derive(Subcommand, Debug)]
enum AlertCommand {
    /// Subscribe an email to a section
    Add {
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        course_id: i64,
        /// Minutes between notifications (1-1440)
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MINUTES)]
        interval: i64,
    },
    /// List the alerts of an email
    List {
        #[arg(short, long)]
        email: String,
        /// Bypass the cached list
        #[arg(long)]
        refresh: bool,
    },
    /// Remove an alert
    Remove {
        id: i64,
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Trigger a sync right away
    Now,
    /// Show the state of the last sync
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    let api = ApiClient::from_config(&config)?;
    info!(api_url = %api.base_url(), "Using backend");

    match cli.command {
        Command::Courses(filter) => {
            let filter = filter.into_filter();
            let courses = api
                .list_courses(&filter.to_params())
                .await
                .map_err(|e| notice(e, "Error loading courses"))?;
            let shown = filter.apply(&courses);
            if shown.is_empty() {
                println!("No courses found");
            }
            for course in &shown {
                println!("{}\n", render::course_card(course));
            }
        }
        Command::Watch { filter, interval } => {
            if let Some(interval) = interval {
                config.refresh_interval = interval;
            }
            watch(Dashboard::new(api, &config, filter.into_filter())).await?;
        }
        Command::Course { code } => {
            let course = api
                .course_by_code(&code)
                .await
                .map_err(|e| notice(e, "Course not found"))?;
            println!("{}", render::course_details(&course, Utc::now()));
        }
        Command::Details { id, interval } => {
            if let Some(interval) = interval {
                config.details_refresh_interval = interval;
            }
            let mut view = CourseDetailsView::new(api, id, &config);
            loop {
                let alive = tokio::select! {
                    alive = view.next_update() => alive,
                    _ = tokio::signal::ctrl_c() => false,
                };
                if !alive {
                    break;
                }
                println!("{}\n", render::details(&view.snapshot(), Utc::now()));
            }
        }
        Command::Search { query, limit } => {
            let courses = api
                .search_courses(&query, limit)
                .await
                .map_err(|e| notice(e, "Search failed"))?;
            if courses.is_empty() {
                println!("No courses found");
            }
            for course in &courses {
                println!("{}\n", render::course_card(course));
            }
        }
        Command::Stats => {
            let stats = api
                .stats()
                .await
                .map_err(|e| notice(e, "Error loading statistics"))?;
            println!("{}", render::stats_line(&stats));
        }
        Command::Alert(command) => {
            let alerts = AlertService::new(api, config.alert_cache_ttl());
            run_alert(&alerts, command).await?;
        }
        Command::Sync(SyncCommand::Now) => {
            let result = api.sync_now().await.map_err(|e| notice(e, "Sync failed"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Sync(SyncCommand::Status) => {
            let result = api
                .sync_status()
                .await
                .map_err(|e| notice(e, "Error loading sync status"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Notify => {
            let result = api
                .check_and_notify()
                .await
                .map_err(|e| notice(e, "Failed to check alerts"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

async fn run_alert(alerts: &AlertService, command: AlertCommand) -> anyhow::Result<()> {
    match command {
        AlertCommand::Add {
            email,
            course_id,
            interval,
        } => {
            let request = AlertRequest {
                email,
                course_id,
                interval_minutes: interval,
            };
            let alert = alerts
                .create_alert(&request)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Alert created successfully (#{})", alert.id);
        }
        AlertCommand::List { email, refresh } => {
            let list = alerts
                .alerts_for_email(&email, refresh)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            let list = alerts.alerts_with_courses(list).await;
            println!("{}", render::alert_list(&list, Utc::now()));
        }
        AlertCommand::Remove { id, email } => {
            alerts
                .delete_alert(id, email.as_deref())
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Alert removed successfully");
        }
    }
    Ok(())
}

fn notice(error: ApiError, fallback: &str) -> anyhow::Error {
    anyhow!(error.user_message(fallback).to_string())
}

enum WatchEvent {
    Updated,
    Closed,
    Line(Option<String>),
    Interrupted,
}

/// Redraws the dashboard on every change and feeds stdin lines to the search
/// box until ctrl-c.
async fn watch(mut dashboard: Dashboard) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let event = tokio::select! {
            alive = dashboard.next_update() => {
                if alive { WatchEvent::Updated } else { WatchEvent::Closed }
            }
            line = lines.next_line(), if stdin_open => WatchEvent::Line(line?),
            _ = tokio::signal::ctrl_c() => WatchEvent::Interrupted,
        };

        match event {
            WatchEvent::Updated => {
                println!("{}\n", render::dashboard(&dashboard.snapshot(), Utc::now()));
            }
            WatchEvent::Line(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    dashboard.search().clear();
                } else {
                    dashboard.search().input(line);
                    dashboard.search().submit();
                }
            }
            WatchEvent::Line(None) => stdin_open = false,
            WatchEvent::Closed | WatchEvent::Interrupted => break,
        }
    }

    Ok(())
}
