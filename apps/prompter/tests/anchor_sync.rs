mod common;

use prompter_core::config::SyncConfig;
use prompter_core::model::{AnchorOrigin, AspectRatio, NodeKind, ScriptView, dialogue_positions};
use prompter_core::protocol::ControlCommand;
use prompter_core::render::{Block, RenderedScript};
use prompter_core::session::SurfaceKind;
use prompter_core::sync::{AnchorEncoder, AnchorResolver, ResolutionPath};
use prompter_bus::LocalHub;
use tokio::time::Instant;

fn booth() -> Vec<Block> {
    vec![
        Block::new(NodeKind::Heading, "INT. BOOTH - NIGHT"),
        Block::new(NodeKind::Character, "ANNA"),
        Block::dialogue("A"),
        Block::new(NodeKind::Character, "BEN"),
        Block::dialogue("B"),
        Block::new(NodeKind::Action, "The lights dim."),
        Block::new(NodeKind::Character, "ANNA"),
        Block::dialogue("C"),
    ]
}

#[test]
fn dialogue_ordinal_survives_a_different_layout() {
    let config = SyncConfig::default();
    let encoder = AnchorEncoder::new(&config);
    let resolver = AnchorResolver::new(&config);

    let mut admin = RenderedScript::from_blocks(booth(), 24, AspectRatio::Widescreen, 600.0);
    let mut viewer = RenderedScript::from_blocks(booth(), 48, AspectRatio::Standard, 900.0);
    let admin_dialogue = dialogue_positions(admin.nodes());
    let viewer_dialogue = dialogue_positions(viewer.nodes());
    assert_eq!(admin_dialogue.len(), 3);

    for k in 0..3 {
        let node = admin.nodes()[admin_dialogue[k]].clone();
        let target = resolver.target_for(&node, &admin.metrics());
        admin.scroll_to(target);

        let anchor = encoder
            .encode_view(&admin, AnchorOrigin::Admin)
            .expect("encode");
        assert_eq!(anchor.index, Some(k));
        assert_eq!(anchor.total_count, Some(3));
        assert_eq!(anchor.text.as_deref(), Some(node.text.as_str()));

        let resolution = resolver.resolve(&anchor, &mut viewer).expect("resolve");
        assert_eq!(resolution.path, ResolutionPath::Index);
        assert_eq!(resolution.node, Some(viewer_dialogue[k]));
        assert_eq!(viewer.highlighted(), Some(viewer_dialogue[k]));
    }
}

#[test]
fn resolving_twice_lands_on_the_same_target() {
    let config = SyncConfig::default();
    let encoder = AnchorEncoder::new(&config);
    let resolver = AnchorResolver::new(&config);
    let mut admin = RenderedScript::from_blocks(booth(), 32, AspectRatio::Widescreen, 500.0);
    let mut viewer = RenderedScript::from_blocks(booth(), 40, AspectRatio::Widescreen, 700.0);

    admin.scroll_to(120.0);
    let anchor = encoder.encode_view(&admin, AnchorOrigin::Remote).expect("encode");
    let first = resolver.resolve(&anchor, &mut viewer).expect("first");
    viewer.scroll_to(0.0);
    let second = resolver.resolve(&anchor, &mut viewer).expect("second");
    assert_eq!(first, second);
    assert_eq!(viewer.metrics().scroll_top, first.target);
}

#[tokio::test(start_paused = true)]
async fn rollback_returns_to_the_line_before_the_sampled_one() {
    let hub = LocalHub::new();
    let mut admin = common::surface(SurfaceKind::Admin, &hub);
    let now = Instant::now();
    admin
        .command(ControlCommand::LoadScript(Some("pilot".into())), now)
        .expect("load");

    let nodes = admin.view().nodes().to_vec();
    let dialogue = dialogue_positions(&nodes);
    assert_eq!(dialogue.len(), 5);
    let delta = &nodes[dialogue[3]];
    assert_eq!(delta.text, "Delta.");
    let viewport = admin.view().metrics().viewport_height;
    admin.user_scroll(delta.center() - viewport / 2.0, now);

    let checkpoint = admin.sample_checkpoint().expect("checkpoint");
    assert!(checkpoint.from_rollback);
    assert_eq!(checkpoint.index, Some(2));
    assert_eq!(checkpoint.text.as_deref(), Some("Charlie."));

    admin.user_scroll(0.0, now);
    let resolution = admin.rollback(now).expect("rollback");
    assert_eq!(resolution.node, Some(dialogue[2]));
    assert_eq!(admin.outbound().anchors_sent(), 1);
}

#[tokio::test(start_paused = true)]
async fn rollback_without_checkpoint_or_dialogue_goes_to_the_beginning() {
    let hub = LocalHub::new();
    let mut remote = common::surface(SurfaceKind::Remote, &hub);
    let resolution = remote.rollback(Instant::now()).expect("never fails");
    assert_eq!(resolution.path, ResolutionPath::Fallback);
    assert_eq!(resolution.target, 0.0);
    assert_eq!(remote.view().metrics().scroll_top, 0.0);
}

#[tokio::test(start_paused = true)]
async fn rollback_without_checkpoint_uses_the_first_dialogue_line() {
    let hub = LocalHub::new();
    let mut admin = common::surface(SurfaceKind::Admin, &hub);
    let now = Instant::now();
    admin
        .command(ControlCommand::LoadScript(Some("pilot".into())), now)
        .expect("load");
    admin.user_scroll(300.0, now);
    let resolution = admin.rollback(now).expect("rollback");
    let first = dialogue_positions(admin.view().nodes())[0];
    assert_eq!(resolution.node, Some(first));
}
