use alloy_primitives::Address;

/// Which event to fetch and the constraints on its indexed arguments.
///
/// Modeled as a closed enumeration instead of reflecting into contract ABIs
/// at runtime: the validator only ever watches these three events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDescriptor {
    /// ERC-20 `Transfer` events into the foreign bridge account.
    Transfer { to: Address },
    /// Home bridge `Confirmation` events emitted for one validator.
    Confirmation { validator: Address },
    /// Home bridge `Completion` events, unfiltered.
    Completion,
}

impl EventDescriptor {
    pub fn event_name(&self) -> &'static str {
        match self {
            EventDescriptor::Transfer { .. } => "Transfer",
            EventDescriptor::Confirmation { .. } => "Confirmation",
            EventDescriptor::Completion => "Completion",
        }
    }
}

/// A bounded log query against one contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventQuery {
    pub contract: Address,
    pub descriptor: EventDescriptor,
    /// Inclusive.
    pub from_block: u64,
    /// Inclusive.
    pub to_block: u64,
}
