//! Replays window messages through the widget and the integration bridge.
//!
//! Reads newline-delimited JSON messages from stdin (or from the file given
//! as the first argument), prints every message posted back as a JSON line
//! on stdout, and finishes with the widget view. An optional second
//! argument points at a widget config file.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use softphone_adapter::config::load_config_from_path;
use softphone_adapter::config::WidgetConfig;
use softphone_adapter::event_log::{CombinedSink, EventRingBuffer, EventSink, LogEventSink};
use softphone_adapter::third_party::NoopContactConsumers;
use softphone_adapter::transport::{ChannelTransport, MessageBus};
use softphone_adapter::{init_logging, Adapter, ThirdPartyService};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.get(1) {
        Some(path) => load_config_from_path(Path::new(path)),
        None => WidgetConfig::default(),
    };

    let result = match args.first().map(String::as_str) {
        Some(path) if path != "-" => match tokio::fs::File::open(path).await {
            Ok(file) => replay(BufReader::new(file), config).await,
            Err(e) => {
                log::error!("Cannot open {}: {}", path, e);
                std::process::exit(1);
            }
        },
        _ => replay(BufReader::new(tokio::io::stdin()), config).await,
    };

    if let Err(e) = result {
        log::error!("Replay failed: {}", e);
        std::process::exit(1);
    }
}

async fn replay<R: AsyncBufRead + Unpin>(input: R, config: WidgetConfig) -> std::io::Result<()> {
    let buffer = Arc::new(EventRingBuffer::with_max_entries(
        config.bridge.event_buffer_entries,
    ));
    let events: Arc<dyn EventSink> = Arc::new(CombinedSink::new(vec![
        Arc::new(LogEventSink) as Arc<dyn EventSink>,
        buffer.clone() as Arc<dyn EventSink>,
    ]));

    let (transport, mut outbound) = ChannelTransport::new();
    let transport = Arc::new(transport);

    let mut adapter = match Adapter::new(config.adapter.clone(), transport.clone()) {
        Ok(adapter) => adapter.with_event_sink(events.clone()),
        Err(e) => {
            log::error!("Invalid widget options: {}", e);
            return Ok(());
        }
    };
    let service = ThirdPartyService::new(
        transport,
        config.bridge.request_timeouts(),
        Arc::new(NoopContactConsumers),
        events,
    );

    let bus = MessageBus::new();
    let listener = service.listen(bus.subscribe());

    let mut lines = input.lines();
    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Line {}: not JSON: {}", line_number, e);
                continue;
            }
        };

        adapter.handle_message(&message);
        bus.publish(message);
        // Let the bridge listener and any spawned fetches run.
        tokio::task::yield_now().await;

        while let Ok(posted) = outbound.try_recv() {
            println!("{}", posted);
        }
    }

    drop(bus);
    if let Err(e) = listener.await {
        log::warn!("Bridge listener ended abnormally: {}", e);
    }
    while let Ok(posted) = outbound.try_recv() {
        println!("{}", posted);
    }

    let summary = json!({
        "view": adapter.view(),
        "service": service.state(),
        "events": buffer.stats(),
    });
    println!("{}", summary);
    Ok(())
}
