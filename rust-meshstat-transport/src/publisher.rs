//! Background publisher task.
//!
//! The task runs independently of the decode path. It never sees decoder or
//! statistics state, only the publications arriving on its channel.

use anyhow::{bail, Context, Result};
use log::{debug, info, trace, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use rust_meshstat_common::{Publication, QoS};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::{ChannelSink, TransportKind, TransportOptions};

/// Shortest keep-alive accepted by the MQTT client.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Time allowed for the DISCONNECT to go out once everything is acknowledged.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// One line of stdout output.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub client_id: &'a str,
    pub topic: &'a str,
    pub qos: u8,
    pub payload: serde_json::Value,
}

impl<'a> Envelope<'a> {
    pub fn new(client_id: &'a str, publication: &'a Publication) -> Result<Self> {
        let payload = serde_json::from_slice(&publication.payload)
            .with_context(|| format!("Publication on {} is not valid JSON", publication.topic))?;
        Ok(Self {
            client_id,
            topic: &publication.topic,
            qos: publication.qos.level(),
            payload,
        })
    }

    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self).context("Failed to encode envelope")?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Handle to a running publisher task.
#[derive(Debug)]
pub struct TelemetryPublisher {
    connected: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

impl TelemetryPublisher {
    /// Start the publisher on the current tokio runtime.
    ///
    /// Returns the sink to hand to the decode path. The task stops once every
    /// clone of the sink has been dropped and every queued publication has
    /// been acknowledged at its QoS level.
    pub fn spawn(options: TransportOptions) -> (ChannelSink, Self) {
        let (sender, receiver) = mpsc::channel(options.channel_capacity.max(1));
        let connected = Arc::new(AtomicBool::new(false));

        let task_connected = Arc::clone(&connected);
        let handle = tokio::spawn(async move {
            match options.kind {
                TransportKind::Mqtt => run_mqtt(receiver, options, task_connected).await,
                TransportKind::Stdout => run_stdout(receiver, options, task_connected).await,
            }
        });

        (ChannelSink::new(sender), Self { connected, handle })
    }

    /// Whether the broker has accepted the current connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Wait for the task to drain its queue, giving up after `grace`.
    ///
    /// All sinks must have been dropped, otherwise the task keeps waiting for
    /// more publications until `grace` runs out.
    pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
        match timeout(grace, &mut self.handle).await {
            Ok(joined) => joined.context("Publisher task failed")?,
            Err(_) => {
                warn!("Publisher did not drain within {:?}, aborting", grace);
                self.handle.abort();
                Ok(())
            }
        }
    }
}

async fn run_stdout(
    mut receiver: mpsc::Receiver<Publication>,
    options: TransportOptions,
    connected: Arc<AtomicBool>,
) -> Result<()> {
    connected.store(true, Ordering::Relaxed);

    while let Some(publication) = receiver.recv().await {
        let line = Envelope::new(&options.client_id, &publication)?.to_line()?;
        print!("{}", String::from_utf8_lossy(&line));
    }

    connected.store(false, Ordering::Relaxed);
    Ok(())
}

/* ---------------------------------------------------------------- *
 * MQTT
 * ---------------------------------------------------------------- */

fn mqtt_options(options: &TransportOptions) -> Result<MqttOptions> {
    if options.client_id.is_empty() {
        bail!("client_id must not be empty");
    }
    let (host, port) = options
        .endpoint
        .rsplit_once(':')
        .with_context(|| format!("Broker endpoint {} is not host:port", options.endpoint))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in broker endpoint {}", options.endpoint))?;

    let mut mqtt = MqttOptions::new(options.client_id.as_str(), host, port);
    mqtt.set_keep_alive(Duration::from_millis(options.keep_alive_interval_ms).max(MIN_KEEP_ALIVE))
        // keep unacknowledged publications across reconnects
        .set_clean_session(false);
    Ok(mqtt)
}

fn mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Count one publication as delivered.
fn acknowledge(outstanding: &AtomicUsize) {
    let _ = outstanding.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

/// Hand publications from the channel to the MQTT client.
async fn forward(mut receiver: mpsc::Receiver<Publication>, client: AsyncClient, outstanding: Arc<AtomicUsize>) {
    while let Some(publication) = receiver.recv().await {
        trace!("Publishing on {}", publication.topic);
        outstanding.fetch_add(1, Ordering::SeqCst);

        let qos = mqtt_qos(publication.qos);
        if let Err(e) = client
            .publish(publication.topic.as_str(), qos, false, publication.payload.to_vec())
            .await
        {
            warn!("Dropping publication on {}: {}", publication.topic, e);
            acknowledge(&outstanding);
        }
    }
}

async fn run_mqtt(
    receiver: mpsc::Receiver<Publication>,
    options: TransportOptions,
    connected: Arc<AtomicBool>,
) -> Result<()> {
    let retry = Duration::from_millis(options.reconnect_interval_ms);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&options)?, options.channel_capacity.max(1));

    let outstanding = Arc::new(AtomicUsize::new(0));
    let mut forwarder = tokio::spawn(forward(receiver, client.clone(), Arc::clone(&outstanding)));
    let mut draining = false;

    loop {
        let event = if draining {
            if outstanding.load(Ordering::SeqCst) == 0 {
                break;
            }
            eventloop.poll().await
        } else {
            tokio::select! {
                joined = &mut forwarder => {
                    if let Err(e) = joined {
                        warn!("Publication forwarder failed: {}", e);
                    }
                    draining = true;
                    continue;
                }
                event = eventloop.poll() => event,
            }
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(
                    "Connected to broker {} as {} (session present: {})",
                    options.endpoint, options.client_id, ack.session_present
                );
                connected.store(true, Ordering::Relaxed);
            }
            // QoS 1 and 2 complete on the broker's ack, QoS 0 once written
            Ok(Event::Incoming(Packet::PubAck(_)))
            | Ok(Event::Incoming(Packet::PubComp(_)))
            | Ok(Event::Outgoing(Outgoing::Publish(0))) => {
                acknowledge(&outstanding);
                trace!("Publication delivered, {} outstanding", outstanding.load(Ordering::SeqCst));
            }
            Ok(event) => trace!("{:?}", event),
            Err(e) => {
                if connected.swap(false, Ordering::Relaxed) {
                    warn!("Lost connection to {}: {}", options.endpoint, e);
                } else {
                    warn!("Connection to {} failed: {}, retrying in {:?}", options.endpoint, e, retry);
                }
                sleep(retry).await;
            }
        }
    }

    if connected.load(Ordering::Relaxed) {
        disconnect(&client, &mut eventloop).await;
    }
    connected.store(false, Ordering::Relaxed);
    info!("Publisher stopped");

    Ok(())
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.disconnect().await {
        debug!("Failed to queue disconnect: {}", e);
        return;
    }

    let sent = timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if sent.is_err() {
        debug!("Disconnect not sent within {:?}", DISCONNECT_GRACE);
    }
}
