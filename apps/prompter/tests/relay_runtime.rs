mod common;

use std::time::Duration;

use prompter_bus::LocalHub;
use prompter_core::config::SyncConfig;
use prompter_core::protocol::ControlCommand;
use prompter_core::session::{StateRelay, SurfaceKind, spawn_relay, spawn_surface};
use tokio::time::sleep;

#[test_timeout::tokio_timeout_test(paused)]
async fn surfaces_follow_the_relay_and_recover_after_an_outage() {
    let hub = LocalHub::new();
    let relay_peer = common::peer(&hub);
    let relay = spawn_relay(
        relay_peer.transport,
        StateRelay::default(),
        SyncConfig::default().reconnect_delay,
    );

    let admin_peer = common::peer(&hub);
    let viewer_peer = common::peer(&hub);
    let admin = spawn_surface(
        common::surface_on(SurfaceKind::Admin, admin_peer.transport.clone(), 600.0),
        admin_peer.transport.clone(),
    );
    let viewer = spawn_surface(
        common::surface_on(SurfaceKind::Viewer, viewer_peer.transport.clone(), 900.0),
        viewer_peer.transport.clone(),
    );

    admin
        .command(ControlCommand::LoadScript(Some("pilot".into())))
        .await
        .expect("load");
    admin.command(ControlCommand::Play).await.expect("play");
    sleep(Duration::from_secs(2)).await;

    let status = viewer.status().await.expect("viewer status");
    assert!(status.state.is_playing);
    assert_eq!(status.state.current_script_id.as_deref(), Some("pilot"));
    assert!(status.revision.is_some());
    assert!(status.scroll_top > 0.0, "viewer autoplays locally");

    let status = admin.status().await.expect("admin status");
    assert_eq!(status.anchors_sent, 0, "autoplay must not broadcast positions");
    assert!(status.checkpoint.is_some(), "play samples a checkpoint");

    viewer_peer.link.sever();
    sleep(Duration::from_millis(100)).await;
    admin
        .command(ControlCommand::SetSpeed(2.5))
        .await
        .expect("speed");
    sleep(Duration::from_secs(1)).await;

    let status = viewer.status().await.expect("viewer status");
    assert!(!status.connected);
    assert_eq!(status.state.speed, 1.0);

    sleep(Duration::from_secs(5)).await;
    let status = viewer.status().await.expect("viewer status");
    assert!(status.connected);
    assert_eq!(status.state.speed, 2.5, "GET_STATE after reconnect catches up");

    let resolution = admin.rollback().await.expect("rollback");
    assert!(resolution.node.is_some());
    sleep(Duration::from_millis(100)).await;
    let status = viewer.status().await.expect("viewer status");
    assert!(!status.state.is_playing, "rollback pauses every surface");
    assert_eq!(status.anchors_sent, 0);

    admin.shutdown().await;
    viewer.shutdown().await;
    relay.abort();
}

#[test_timeout::tokio_timeout_test(paused)]
async fn viewer_rejects_local_commands_through_the_handle() {
    let hub = LocalHub::new();
    let peer = common::peer(&hub);
    let viewer = spawn_surface(
        common::surface_on(SurfaceKind::Viewer, peer.transport.clone(), 700.0),
        peer.transport.clone(),
    );
    assert!(viewer.command(ControlCommand::Play).await.is_err());
    assert!(viewer.rollback().await.is_err());
    let status = viewer.status().await.expect("status");
    assert_eq!(status.controls_sent, 0);
    viewer.shutdown().await;
}

#[test_timeout::tokio_timeout_test(paused)]
async fn surfaces_resync_with_a_restarted_relay() {
    let hub = LocalHub::new();
    let reconnect_delay = SyncConfig::default().reconnect_delay;
    let first_relay = spawn_relay(common::peer(&hub).transport, StateRelay::default(), reconnect_delay);

    let admin_peer = common::peer(&hub);
    let viewer_peer = common::peer(&hub);
    let admin = spawn_surface(
        common::surface_on(SurfaceKind::Admin, admin_peer.transport.clone(), 600.0),
        admin_peer.transport.clone(),
    );
    let viewer = spawn_surface(
        common::surface_on(SurfaceKind::Viewer, viewer_peer.transport.clone(), 900.0),
        viewer_peer.transport.clone(),
    );

    admin
        .command(ControlCommand::LoadScript(Some("pilot".into())))
        .await
        .expect("load");
    for speed in [1.5, 1.75, 1.25] {
        admin.command(ControlCommand::SetSpeed(speed)).await.expect("speed");
    }
    sleep(Duration::from_secs(1)).await;
    let before = viewer.status().await.expect("viewer status");
    assert_eq!(before.state.speed, 1.25);
    let high_water = before.revision.expect("revisioned");

    // The relay process goes away and every client loses its connection.
    first_relay.abort();
    admin_peer.link.sever();
    viewer_peer.link.sever();
    let second_relay = spawn_relay(common::peer(&hub).transport, StateRelay::default(), reconnect_delay);

    sleep(reconnect_delay + Duration::from_secs(1)).await;
    assert!(viewer.status().await.expect("viewer status").connected);

    admin.command(ControlCommand::SetSpeed(2.0)).await.expect("speed");
    sleep(Duration::from_millis(500)).await;

    let after = viewer.status().await.expect("viewer status");
    assert_eq!(after.state.speed, 2.0, "fresh relay numbering is not treated as stale");
    assert!(after.revision.is_some_and(|revision| revision < high_water));

    admin.shutdown().await;
    viewer.shutdown().await;
    second_relay.abort();
}
