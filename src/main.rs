mod json_payload;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rabbitmq_sdk::config::{self, CONFIG_FILE_NAME};
use rabbitmq_sdk::{AioRabbitMQ, MessagePayload, RabbitConfig, RabbitMQ};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::json_payload::JsonPayload;

const QUEUE: &str = "test";

const USAGE: &str = "usage: rabbitmq-sdk <send|receive|aio_send|aio_receive|aio_get_queues|init_config [path]>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    if command == "init_config" {
        let path = args.next().unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
        return config::create_default_config_file(Path::new(&path));
    }

    let settings = load_settings()?;
    match command.as_str() {
        "send" => send(&settings),
        "receive" => receive(&settings),
        "aio_send" | "aio_receive" | "aio_get_queues" => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(async {
                match command.as_str() {
                    "aio_send" => aio_send(&settings).await,
                    "aio_receive" => aio_receive(&settings).await,
                    _ => aio_get_queues(&settings).await,
                }
            })
        }
        other => Err(anyhow!("unknown command '{}'\n{}", other, USAGE)),
    }
}

// A config file wins over the environment.
fn load_settings() -> Result<RabbitConfig> {
    match config::find_config_file() {
        Ok(_) => config::load_config(),
        Err(_) => RabbitConfig::from_env(),
    }
}

fn print_delivery_body(body: &[u8]) {
    println!("[x] Received {:?}", String::from_utf8_lossy(body));
    match JsonPayload::from_bytes(body) {
        Ok(data) => println!("data: firstname={}, lastname={}", data.firstname, data.lastname),
        Err(e) => warn!("Skipping message that is not a JsonPayload: {}", e),
    }
}

fn send(settings: &RabbitConfig) -> Result<()> {
    let mut conn = RabbitMQ::new(settings.queue);
    conn.connect_with(&settings.connection)?;

    let payload = JsonPayload::new("John", "Doe");
    println!("payload: {}", MessagePayload::serialize(&payload)?);
    conn.send(QUEUE, &payload)?;

    conn.disconnect()?;
    Ok(())
}

fn receive(settings: &RabbitConfig) -> Result<()> {
    let mut conn = RabbitMQ::new(settings.queue);
    conn.connect_with(&settings.connection)?;

    let manual_ack = !settings.queue.auto_ack;
    conn.receive(QUEUE, |delivery| {
        print_delivery_body(&delivery.body);
        if manual_ack {
            if let Err(e) = conn.commit_ack(&delivery) {
                warn!("Failed to acknowledge message: {}", e);
            }
        }
    })?;

    conn.disconnect()?;
    Ok(())
}

async fn aio_send(settings: &RabbitConfig) -> Result<()> {
    let mut conn = AioRabbitMQ::new(settings.queue);
    conn.connect_with(&settings.connection).await?;

    let payload = JsonPayload::new("John", "Doe");
    println!("payload: {}", MessagePayload::serialize(&payload)?);
    conn.send(QUEUE, &payload).await?;

    conn.disconnect().await?;
    Ok(())
}

async fn aio_receive(settings: &RabbitConfig) -> Result<()> {
    let mut conn = AioRabbitMQ::new(settings.queue);
    conn.connect_with(&settings.connection).await?;

    let manual_ack = !settings.queue.auto_ack;
    let consumer = conn
        .receive(QUEUE, move |delivery| async move {
            print_delivery_body(&delivery.body);
            if manual_ack {
                if let Err(e) = delivery.ack().await {
                    warn!("Failed to acknowledge message: {}", e);
                }
            }
        })
        .await?;

    info!("Listening on '{}'. Press Ctrl+C to exit.", QUEUE);
    tokio::select! {
        finished = consumer => {
            finished??;
            warn!("Consumer on '{}' was closed by the broker", QUEUE);
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    conn.disconnect().await?;
    Ok(())
}

async fn aio_get_queues(settings: &RabbitConfig) -> Result<()> {
    let conn = AioRabbitMQ::new(settings.queue);
    let queues = conn.get_list_queues(&settings.management).await?;
    println!("{:?}", queues);
    Ok(())
}
