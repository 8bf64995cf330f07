#![allow(dead_code)]

use std::sync::Arc;

use prompter_bus::{LocalHub, LocalPeer};
use prompter_core::config::SyncConfig;
use prompter_core::render::RenderedScript;
use prompter_core::script::{InMemoryScripts, Script};
use prompter_core::session::{Outbound, Surface, SurfaceKind};
use prompter_core::transport::{BusTransport, Transport};

pub const ROOM: &str = "studio";

/// Five dialogue lines, each under its own character cue.
pub const PILOT: &str = "\
ANNA
Alpha.

BEN
Bravo.

ANNA
Charlie.

BEN
Delta.

ANNA
Echo.
";

pub fn scripts() -> Arc<InMemoryScripts> {
    Arc::new(InMemoryScripts::new().with(Script::new("pilot", PILOT)))
}

pub struct Peer {
    pub link: Arc<LocalPeer>,
    pub transport: Arc<dyn Transport>,
}

pub fn peer(hub: &Arc<LocalHub>) -> Peer {
    let link = Arc::new(hub.attach());
    let transport: Arc<dyn Transport> = Arc::new(BusTransport::new(Arc::clone(&link), ROOM));
    Peer { link, transport }
}

pub fn surface_on(
    kind: SurfaceKind,
    transport: Arc<dyn Transport>,
    viewport_height: f64,
) -> Surface<RenderedScript> {
    Surface::new(
        kind,
        RenderedScript::new(viewport_height),
        scripts(),
        Outbound::for_role(kind.role(), transport),
        SyncConfig::default(),
    )
}

pub fn surface(kind: SurfaceKind, hub: &Arc<LocalHub>) -> Surface<RenderedScript> {
    surface_on(kind, peer(hub).transport, 400.0)
}
