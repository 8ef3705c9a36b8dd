use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use apiwatch::config::Config;
use apiwatch::history::ErrorHistoryPoller;
use apiwatch::instrument::{ClientConfig, InstrumentedClient};
use apiwatch::logging::{self, obj, v_num, v_str, Domain, Level};
use apiwatch::record::{RecordFilter, RecorderHandle};
use apiwatch::report;
use apiwatch::transport::http::ReqwestTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("status_url", v_str(&cfg.status_url)),
            ("recorder_capacity", v_num(cfg.recorder_capacity as f64)),
            ("default_timeout_ms", v_num(cfg.default_timeout_ms as f64)),
        ]),
    );

    let recorder = RecorderHandle::new(cfg.recorder_capacity);
    let transport = Arc::new(ReqwestTransport::new());
    let client = Arc::new(InstrumentedClient::with_config(
        transport,
        recorder.clone(),
        ClientConfig::from(&cfg),
    ));
    let poller = Arc::new(ErrorHistoryPoller::new(
        client,
        cfg.status_url.clone(),
        Duration::from_secs(cfg.poll_interval_secs),
        cfg.max_display_errors,
    ));

    let cancel = CancellationToken::new();
    let poll_task = tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    loop {
        sleep(Duration::from_secs(cfg.poll_interval_secs)).await;

        let recent = recorder.query(&RecordFilter { limit: Some(10), ..Default::default() });
        println!("{}", report::render_text(&report::panel_rows(&recent)));

        let view = poller.snapshot();
        match (&view.report, &view.last_failure) {
            (Some(rep), _) if rep.is_empty() => println!("errors: none"),
            (Some(rep), _) => {
                if let Some(alert) = &rep.global_alert {
                    println!("alert[{}]: {}", alert.kind, alert.message);
                }
                for entry in rep.global_error_history.iter().take(5) {
                    println!("  {}: {}", entry.kind.as_deref().unwrap_or("unknown"), entry.message);
                }
                for (instance, errs) in &rep.instance_errors {
                    if !errs.error_history.is_empty() || errs.alert.is_some() {
                        println!("  instance {}: {} errors", instance, errs.error_history.len());
                    }
                }
            }
            (None, Some(failure)) => println!("error history unavailable: {}", failure),
            (None, None) => {}
        }

        if Path::new(&cfg.kill_file).exists() {
            logging::log(Level::Info, Domain::System, "shutdown", obj(&[("reason", v_str("kill_file"))]));
            break;
        }
    }

    cancel.cancel();
    let _ = poll_task.await;
    Ok(())
}
