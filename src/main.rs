//! Porter Monitor CLI
//!
//! 监控车库门状态，开门过久时通过短信提醒

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use porter_monitor::config::parse_recipients;
use porter_monitor::notification::{ConsoleNotifier, NotificationDispatcher, Notifier, SendResult, TwilioNotifier};
use porter_monitor::{EntityTracker, HttpStatusSource, MonitorConfig, MonitorLoop, StatusSource};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(unix)]
use tokio::signal::unix::Signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "porter")]
#[command(about = "Porter Monitor - 监控车库门状态并发送短信提醒")]
#[command(version)]
struct Cli {
    /// 配置文件路径 (默认: ~/.config/porter-monitor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 持续监控门状态并发送通知
    Watch(WatchArgs),
    /// 查询一次当前门状态
    Status {
        /// Porter API 地址
        #[arg(long)]
        api_url: Option<String>,
        /// Porter API key
        #[arg(long)]
        api_key: Option<String>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 向所有接收者发送一条自定义消息
    Send {
        /// 消息内容
        message: String,
        #[command(flatten)]
        delivery: DeliveryArgs,
    },
}

/// 发送相关参数
#[derive(Args)]
struct DeliveryArgs {
    /// 发送方号码
    #[arg(long)]
    sender: Option<String>,
    /// 接收方号码，格式 '+18005550199,+18008675309'
    #[arg(long)]
    recipients: Option<String>,
    /// Twilio account SID
    #[arg(long)]
    twilio_sid: Option<String>,
    /// Twilio auth token
    #[arg(long)]
    twilio_token: Option<String>,
    /// 只打印不发送
    #[arg(long)]
    dry_run: bool,
}

/// Watch 命令参数
#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    delivery: DeliveryArgs,
    /// Porter API 地址
    #[arg(long)]
    api_url: Option<String>,
    /// Porter API key
    #[arg(long)]
    api_key: Option<String>,
    /// 开门多少分钟后提醒
    #[arg(long)]
    open_threshold: Option<u64>,
    /// 重复提醒间隔（分钟），0 表示只提醒一次
    #[arg(long)]
    repeat_threshold: Option<u64>,
    /// 轮询间隔（秒）
    #[arg(long, short)]
    interval: Option<u64>,
    /// 只运行一轮后退出
    #[arg(long)]
    once: bool,
}

impl DeliveryArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(sender) = &self.sender {
            config.sender = sender.clone();
        }
        if let Some(recipients) = &self.recipients {
            config.recipients = parse_recipients(recipients);
        }
        if let Some(sid) = &self.twilio_sid {
            config.twilio.account_sid = sid.clone();
        }
        if let Some(token) = &self.twilio_token {
            config.twilio.auth_token = token.clone();
        }
    }
}

impl WatchArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        self.delivery.apply(config);
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
        }
        if let Some(mins) = self.open_threshold {
            config.open_threshold_mins = mins;
        }
        if let Some(mins) = self.repeat_threshold {
            config.repeat_threshold_mins = mins;
        }
        if let Some(secs) = self.interval {
            config.poll_interval_secs = secs;
        }
    }
}

/// 构建分发器；dry-run 时使用控制台渠道
fn build_dispatcher(config: &MonitorConfig, dry_run: bool) -> Result<NotificationDispatcher> {
    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(ConsoleNotifier::new())
    } else {
        Arc::new(TwilioNotifier::new(config.twilio())?)
    };

    Ok(
        NotificationDispatcher::new(notifier, config.sender.clone(), config.recipients.clone())
            .with_delivery_timeout(config.delivery_timeout()),
    )
}

/// 注册 Ctrl+C / SIGTERM 处理器，返回收到任一信号时完成的 future
///
/// 处理器在调用时立即注册，不依赖返回的 future 何时首次被 poll。
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());

    async move {
        let wait = |registered: std::io::Result<Signal>, name: &'static str| async move {
            match registered {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, signal = name, "Failed to listen for signal");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = wait(interrupt, "SIGINT") => {}
            _ = wait(terminate, "SIGTERM") => {}
        }
        info!("Termination signal received");
    }
}

#[cfg(not(unix))]
fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Termination signal received");
    }
}

async fn run_watch(mut config: MonitorConfig, args: WatchArgs) -> Result<()> {
    args.apply(&mut config);
    let dry_run = args.delivery.dry_run;
    config.validate(!dry_run).context("Invalid configuration")?;

    let source: Arc<dyn StatusSource> = Arc::new(HttpStatusSource::new(config.status_source())?);
    let dispatcher = build_dispatcher(&config, dry_run)?;
    let tracker = EntityTracker::new(config.open_threshold(), config.repeat_threshold());

    let mut monitor = MonitorLoop::new(source, dispatcher, tracker)
        .with_poll_interval(config.poll_interval())
        .with_poll_timeout(config.poll_timeout())
        .with_stop_grace(config.stop_grace());

    if args.once {
        monitor.announce_start().await;
        let report = monitor.run_cycle().await;
        info!(poll_ok = report.poll_ok, notices = report.notices.len(), "Single cycle finished");
        return Ok(());
    }

    // 先注册信号处理器，再发送启动通知
    let shutdown = shutdown_signal();
    monitor.run(shutdown).await;
    Ok(())
}

async fn run_status(config: MonitorConfig, json: bool) -> Result<()> {
    let source = HttpStatusSource::new(config.status_source())?;
    let states = source.list().await?;

    let mut snapshots: Vec<_> = states.into_values().collect();
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    println!("发现 {} 个门:\n", snapshots.len());
    let now = chrono::Utc::now();
    for snapshot in snapshots {
        let since = (now - snapshot.last_change).to_std().unwrap_or_default();
        println!(
            "  {} | 状态: {} | 关闭值: {} | 已持续: {}",
            snapshot.name,
            snapshot.current_state,
            snapshot.closed_state,
            porter_monitor::notification::format_duration(since)
        );
    }
    Ok(())
}

async fn run_send(mut config: MonitorConfig, message: String, args: DeliveryArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate(!args.dry_run).context("Invalid configuration")?;

    let dispatcher = build_dispatcher(&config, args.dry_run)?;
    let results = dispatcher.broadcast(&message).await;

    for (recipient, result) in results {
        match result {
            SendResult::Sent => println!("✅ {}", recipient),
            SendResult::Failed(e) => println!("❌ {}: {}", recipient, e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug porter watch
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("porter_monitor=info,porter=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let mut config = MonitorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch(args) => run_watch(config, args).await?,
        Commands::Status { api_url, api_key, json } => {
            if let Some(url) = api_url {
                config.api_url = url;
            }
            if let Some(key) = api_key {
                config.api_key = key;
            }
            run_status(config, json).await?;
        }
        Commands::Send { message, delivery } => run_send(config, message, delivery).await?,
    }

    Ok(())
}
