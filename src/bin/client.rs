use anyhow::{Context, Result};
use futures::StreamExt;
use sfu_signal::dispatch::message::{Empty, JoinRequest, JoinResponse, LeaveRequest, TrickleMessage};
use sfu_signal::engine::{IceCandidate, SessionDescription};
use sfu_signal::participant::{ParticipantId, RoomId};
use sfu_signal::rpc::{RpcClient, SignalClientConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HOST_CANDIDATE: &str = "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host";
const DEMO_OFFER: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=setup:actpass\r\n";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let participant_id = ParticipantId::from(
        std::env::var("SIGNAL_PARTICIPANT_ID").unwrap_or_else(|_| "demo-participant".to_string()),
    );
    let room_id =
        RoomId::from(std::env::var("SIGNAL_ROOM_ID").unwrap_or_else(|_| "demo-room".to_string()));

    let mut client = RpcClient::connect(SignalClientConfig::from_env()).await?;

    let mut pushes = client.take_pushes().context("server pushes already taken")?;
    tokio::spawn(async move {
        while let Some(push) = pushes.next().await {
            info!(method = %push.method, data = %push.data, "Server push");
        }
    });

    let joined: JoinResponse = client
        .call(
            "join",
            &JoinRequest {
                participant_id: participant_id.clone(),
                room_id: room_id.clone(),
                offer: Some(SessionDescription::offer(DEMO_OFFER)),
            },
        )
        .await
        .context("join failed")?;
    info!(%participant_id, %room_id, sdp = %joined.answer.sdp, "Joined");

    let _: Empty = client
        .call(
            "trickle",
            &TrickleMessage {
                participant_id: participant_id.clone(),
                candidate: IceCandidate::new(HOST_CANDIDATE),
            },
        )
        .await
        .context("trickle failed")?;
    info!(%participant_id, "Candidate sent");

    let _: Empty = client
        .call(
            "leave",
            &LeaveRequest {
                participant_id: participant_id.clone(),
            },
        )
        .await
        .context("leave failed")?;
    info!(%participant_id, "Left");

    Ok(())
}
