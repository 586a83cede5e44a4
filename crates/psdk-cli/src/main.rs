//! `psdk` command line: config checks, the sample service and one-off sends.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use psdk_link::{doctor, ChannelAddress, LinkConfig, LowSpeedChannel, UdpTransport};

use std::sync::Arc;
use std::time::Duration;

/// Payload the sample service sends once per tick.
const SAMPLE_PAYLOAD: [u8; 10] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];

/// Upper bound on drain ticks `send` waits for the buffer to empty.
const FLUSH_MAX_TICKS: u32 = 16;

const MAX_SEND_HZ: f32 = 50.0;

#[derive(Debug, Parser)]
#[command(name = "psdk", version, about = "Low-speed data channel for payload devices")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    /// Run the data transmission sample: periodic send plus logging receivers.
    Run,
    /// Send one payload and wait until it has left the flow buffer.
    Send {
        #[arg(long)]
        channel: ChannelAddress,
        /// Payload as hex, e.g. 00112233
        #[arg(long)]
        hex: String,
    },
    /// Print the configured per-channel bandwidth.
    State {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    link: LinkConfig,
    udp: UdpCfg,
    #[serde(default)]
    sample: SampleCfg,
}

#[derive(Debug, serde::Deserialize)]
struct UdpCfg {
    bind: String,
    peer: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct SampleCfg {
    channel: ChannelAddress,
    send_hz: f32,
    listen: Vec<ChannelAddress>,
    /// Log channel state every N sends (0 = never).
    state_every: u32,
}

impl Default for SampleCfg {
    fn default() -> Self {
        Self {
            channel: ChannelAddress::MasterRcApp,
            send_hz: 1.0,
            listen: vec![
                ChannelAddress::MasterRcApp,
                ChannelAddress::Cloud,
                ChannelAddress::ExtensionPort,
                ChannelAddress::PayloadPort1,
            ],
            state_every: 10,
        }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor_cmd(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Send { channel, hex } => send_cmd(&cfg, channel, &hex).await?,
        Command::State { json } => state_cmd(&cfg, json)?,
    }
    Ok(())
}

fn doctor_cmd(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    doctor::check_link_config(&cfg.link)?;
    doctor::check_udp(&cfg.udp.bind, &cfg.udp.peer)?;
    anyhow::ensure!(
        cfg.sample.send_hz > 0.0 && cfg.sample.send_hz <= MAX_SEND_HZ,
        "sample.send_hz should be (0, {}]",
        MAX_SEND_HZ
    );

    // Sample traffic that can never fit its channel will just drop.
    let per_sec = (SAMPLE_PAYLOAD.len() as f32 * cfg.sample.send_hz) as u32;
    let limit = cfg.link.bandwidth_for(cfg.sample.channel);
    if per_sec > limit {
        warn!("doctor: sample sends {} B/s on {} but limit is {} B/s", per_sec, cfg.sample.channel, limit);
    }
    info!("doctor: OK");
    Ok(())
}

async fn open_link(cfg: &Config) -> Result<(Arc<UdpTransport>, Arc<LowSpeedChannel>)> {
    let (bind, peer) = doctor::check_udp(&cfg.udp.bind, &cfg.udp.peer)?;
    let transport = Arc::new(
        UdpTransport::bind(bind, peer)
            .await
            .with_context(|| format!("bind udp {}", bind))?,
    );
    let link = Arc::new(LowSpeedChannel::new(cfg.link.clone(), transport.clone()));
    link.init().context("link init")?;
    Ok((transport, link))
}

/// Tick period for the sample sender. Never zero, which `interval` rejects.
fn sample_period(send_hz: f32) -> Duration {
    Duration::from_secs_f32(1.0 / send_hz.max(0.02).min(MAX_SEND_HZ))
}

fn log_receiver(channel: ChannelAddress, data: &[u8]) -> psdk_link::Result<()> {
    info!("receive data from {}: {}, len:{}", channel, String::from_utf8_lossy(data), data.len());
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    doctor_cmd(cfg)?;
    let (transport, link) = open_link(cfg).await?;

    for ch in &cfg.sample.listen {
        link.register_receiver(*ch, Arc::new(log_receiver));
    }

    let rx_task = {
        let transport = transport.clone();
        let link = link.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.run_receiver(link).await {
                warn!("udp: receive loop ended: {:#}", e);
            }
        })
    };

    let mut ticker = tokio::time::interval(sample_period(cfg.sample.send_hz));
    let mut sends: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = link.send(cfg.sample.channel, &SAMPLE_PAYLOAD) {
                    warn!("send data to {} error: {}", cfg.sample.channel, e);
                }
                sends = sends.wrapping_add(1);
                if cfg.sample.state_every > 0 && sends % cfg.sample.state_every == 0 {
                    let st = link.state(cfg.sample.channel)?;
                    info!(
                        "state {}: limit={} before={} after={} busy={} dropped={}",
                        st.channel, st.bandwidth_limit, st.bandwidth_before_flow_control,
                        st.bandwidth_after_flow_control, st.busy, st.dropped_total
                    );
                }
            }
        }
    }

    rx_task.abort();
    link.deinit().await.context("link deinit")?;
    Ok(())
}

async fn send_cmd(cfg: &Config, channel: ChannelAddress, payload_hex: &str) -> Result<()> {
    let data = hex::decode(payload_hex.trim()).context("--hex is not valid hex")?;
    let (_transport, link) = open_link(cfg).await?;

    link.send(channel, &data).with_context(|| format!("send {} bytes to {}", data.len(), channel))?;

    let mut ticks = 0;
    while link.state(channel)?.busy && ticks < FLUSH_MAX_TICKS {
        tokio::time::sleep(cfg.link.drain_interval()).await;
        ticks += 1;
    }

    let st = link.state(channel)?;
    if st.busy {
        warn!("send: {} bytes still buffered on {} after {} ticks", st.buffered, channel, ticks);
    }
    println!("{}", serde_json::to_string_pretty(&st)?);
    link.deinit().await.context("link deinit")?;
    Ok(())
}

fn state_cmd(cfg: &Config, json: bool) -> Result<()> {
    let limits: Vec<(ChannelAddress, u32)> = ChannelAddress::ALL
        .into_iter()
        .map(|c| (c, cfg.link.bandwidth_for(c)))
        .collect();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = limits
            .iter()
            .map(|(c, bps)| (c.name().to_string(), (*bps).into()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        println!("drain_interval={}s", cfg.link.drain_interval_s);
        for (c, bps) in limits {
            println!("channel={} wire=0x{:02x} bandwidth={}B/s", c, c.wire(), bps);
        }
    }
    Ok(())
}
