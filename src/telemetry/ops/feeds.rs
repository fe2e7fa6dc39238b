use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Feeds;

#[derive(Copy, Clone, Debug)]
pub enum Phase { List }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::List => "list" } }
    fn span(&self) -> Span { match self { Phase::List => info_span!("list") } }
}

impl OpMarker for Feeds {
    const NAME: &'static str = "feeds";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("feeds") }
}
