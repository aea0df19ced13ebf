/// How a submitted task gets distributed across the agents in a run
/// (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Send to exactly one agent, no forwarding.
    Single,
    /// Send to every agent, no inter-agent forwarding.
    Broadcast,
    /// Send to the next agent in sequence, cursor persists across calls.
    RoundRobin,
    /// Send to the first agent only; its output can be fanned back out via
    /// [`crate::Router::forward_output`].
    Moderator,
}

impl RouteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMode::Single => "single",
            RouteMode::Broadcast => "broadcast",
            RouteMode::RoundRobin => "round-robin",
            RouteMode::Moderator => "moderator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(RouteMode::Single),
            "broadcast" => Some(RouteMode::Broadcast),
            "round-robin" => Some(RouteMode::RoundRobin),
            "moderator" => Some(RouteMode::Moderator),
            _ => None,
        }
    }
}
