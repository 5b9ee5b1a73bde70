use std::sync::Arc;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use tokio::io::{AsyncBufReadExt, BufReader};

use autohub_core::host::registry::DeviceRegistry;
use autohub_core::host::{Device, DeviceAction};
use autohub_core::plugin::{Plugin, PluginInfo};
use autohub_core::poller::PollerPlugin;
use autohub_core::runtime::PluginHost;

use crate::config::Project;

pub mod config;

pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let _ = LogTracer::builder().init();
    let file_appender = tracing_appender::rolling::daily("logs", "autohub");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_level(true)
        .with_writer(std::io::stdout)
        .with_filter(LevelFilter::INFO);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        // 移除输出内容中的 颜色或其它格式相关转义字符
        .with_ansi(false)
        .with_writer(non_blocking)
        // 日志等级过滤
        .with_filter(LevelFilter::INFO);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let collector = Registry::default()
        .with(ErrorLayer::default())
        .with(env_filter)
        .with(file_layer)
        .with(fmt_layer);
    tracing::subscriber::set_global_default(collector).expect("Tracing collect error");
    guard
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "autohub项目配置文件")]
    config: String,
}

pub async fn cmd() {
    let args = Args::parse();
    match config::Configuration::new(args.config).await {
        Ok(configuration) => {
            if let Err(err) = run(configuration.project).await {
                error!("{:#}", err);
            }
        }
        Err(e) => {
            error!("{}", e);
        }
    }
}

async fn run(project: Project) -> anyhow::Result<()> {
    let registry = Arc::new(DeviceRegistry::with_capacity(project.devices.len()));
    let plugin_info = PluginInfo {
        id: project.plugin_id.clone(),
        display_name: project.display_name.clone(),
        version: project.version.clone(),
    };
    let plugin = Arc::new(PollerPlugin::new(
        plugin_info,
        &project.prefs,
        Arc::clone(&registry),
    ));

    let validation = plugin.validate_config(project.prefs.clone());
    if !validation.accepted() {
        for (field, message) in validation.errors.iter() {
            error!("invalid preference {}: {}", field, message);
        }
        anyhow::bail!("plugin preferences rejected");
    }

    let host = PluginHost::new(plugin);
    host.start().await?;

    let mut started: Vec<Arc<Device>> = Vec::new();
    for (id, entry) in project.devices {
        let validation =
            host.validate_device_config(entry.config.clone(), &entry.device_type_id, &id);
        if !validation.accepted() {
            for (field, message) in validation.errors.iter() {
                warn!("[{}] invalid device config {}: {}", id, field, message);
            }
            continue;
        }
        let device = Arc::new(Device::new(id, entry.name, entry.device_type_id, entry.on));
        if let Err(err) = registry.attach(Arc::clone(&device)) {
            warn!("{}", err);
            continue;
        }
        host.device_start(&device);
        started.push(device);
    }

    // stand-in for the host's action dispatch: `<kind> <deviceId>` per line,
    // e.g. `TurnOn lamp-1`
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch_action(&host, &registry, line.trim()).await,
                Ok(None) | Err(_) => {
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
        }
    }
    info!("shutting down");

    for device in started.iter() {
        host.device_stop(device);
        registry.detach(device.as_ref());
    }
    host.stop().await?;
    Ok(())
}

/// Unknown action kinds and unknown devices are logged and dropped.
async fn dispatch_action(host: &PluginHost, registry: &DeviceRegistry, line: &str) {
    if line.is_empty() {
        return;
    }
    let mut parts = line.split_whitespace();
    let (Some(kind), Some(device_id)) = (parts.next(), parts.next()) else {
        warn!("expected `<kind> <deviceId>`, got: {}", line);
        return;
    };
    let action = match DeviceAction::try_from(kind) {
        Ok(action) => action,
        Err(err) => {
            warn!("{}", err);
            return;
        }
    };
    let Some(device) = registry.get(device_id) else {
        warn!("no active device with id {}", device_id);
        return;
    };
    host.handle_device_action(action, &device).await;
}
