use std::fmt;

/// Negotiation state of a peer connection.
///
/// Flags only ever go from `false` to `true`, and `Connected` never falls
/// back to `Negotiating`. `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Created,
    Negotiating { local_set: bool, remote_set: bool },
    Connected,
    Failed,
    Closed,
}

/// Commands that act on a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDataChannel,
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    Close,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }

    /// Check that `operation` may be issued now.
    ///
    /// Returns the state to record while the operation runs, or `None` if
    /// the operation must be rejected.
    pub fn issue(self, operation: Operation) -> Option<Self> {
        use NegotiationState::*;
        use Operation::*;

        match (self, operation) {
            (Closed, _) => None,
            (_, Close) => Some(self),
            (Failed, _) => None,
            (_, CreateDataChannel) => Some(self),
            (Created, CreateOffer | CreateAnswer | SetLocalDescription | SetRemoteDescription) => {
                Some(Negotiating {
                    local_set: false,
                    remote_set: false,
                })
            }
            (
                Negotiating { .. },
                CreateOffer | CreateAnswer | SetLocalDescription | SetRemoteDescription,
            ) => Some(self),
            (Connected, CreateOffer | CreateAnswer | SetLocalDescription | SetRemoteDescription) => {
                None
            }
            (Negotiating { .. } | Connected, AddIceCandidate) => Some(self),
            (Created, AddIceCandidate) => None,
        }
    }

    /// The local description was applied.
    pub fn local_applied(self) -> Self {
        match self {
            NegotiationState::Negotiating { remote_set, .. } => NegotiationState::Negotiating {
                local_set: true,
                remote_set,
            },
            other => other,
        }
    }

    /// The remote description was applied.
    pub fn remote_applied(self) -> Self {
        match self {
            NegotiationState::Negotiating { local_set, .. } => NegotiationState::Negotiating {
                local_set,
                remote_set: true,
            },
            other => other,
        }
    }

    /// The engine reported an established transport. Only takes effect once
    /// both descriptions are in place.
    pub fn connected(self) -> Self {
        match self {
            NegotiationState::Negotiating {
                local_set: true,
                remote_set: true,
            } => NegotiationState::Connected,
            other => other,
        }
    }

    pub fn failed(self) -> Self {
        match self {
            NegotiationState::Closed => NegotiationState::Closed,
            _ => NegotiationState::Failed,
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Created => f.write_str("created"),
            NegotiationState::Negotiating {
                local_set,
                remote_set,
            } => write!(
                f,
                "negotiating (local {}, remote {})",
                if *local_set { "set" } else { "unset" },
                if *remote_set { "set" } else { "unset" },
            ),
            NegotiationState::Connected => f.write_str("connected"),
            NegotiationState::Failed => f.write_str("failed"),
            NegotiationState::Closed => f.write_str("closed"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CreateDataChannel => "create_data_channel",
            Operation::CreateOffer => "create_offer",
            Operation::CreateAnswer => "create_answer",
            Operation::SetLocalDescription => "set_local_description",
            Operation::SetRemoteDescription => "set_remote_description",
            Operation::AddIceCandidate => "add_ice_candidate",
            Operation::Close => "close",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NegotiationState::*;

    const NEGOTIATING: NegotiationState = Negotiating {
        local_set: false,
        remote_set: false,
    };

    #[test]
    fn test_first_negotiation_command_leaves_created() {
        for op in [
            Operation::CreateOffer,
            Operation::CreateAnswer,
            Operation::SetLocalDescription,
            Operation::SetRemoteDescription,
        ] {
            assert_eq!(Created.issue(op), Some(NEGOTIATING), "{op}");
        }
    }

    #[test]
    fn test_data_channel_allowed_until_terminal() {
        for state in [Created, NEGOTIATING, Connected] {
            assert_eq!(state.issue(Operation::CreateDataChannel), Some(state));
        }
        assert_eq!(Failed.issue(Operation::CreateDataChannel), None);
        assert_eq!(Closed.issue(Operation::CreateDataChannel), None);
    }

    #[test]
    fn test_offer_and_answer_rejected_once_connected() {
        assert_eq!(Connected.issue(Operation::CreateOffer), None);
        assert_eq!(Connected.issue(Operation::CreateAnswer), None);
        assert_eq!(Connected.issue(Operation::SetRemoteDescription), None);
    }

    #[test]
    fn test_candidates_need_negotiation_started() {
        assert_eq!(Created.issue(Operation::AddIceCandidate), None);
        assert_eq!(NEGOTIATING.issue(Operation::AddIceCandidate), Some(NEGOTIATING));
        assert_eq!(Connected.issue(Operation::AddIceCandidate), Some(Connected));
    }

    #[test]
    fn test_close_allowed_unless_closed() {
        for state in [Created, NEGOTIATING, Connected, Failed] {
            assert_eq!(state.issue(Operation::Close), Some(state));
        }
        assert_eq!(Closed.issue(Operation::Close), None);
    }

    #[test]
    fn test_flags_only_move_forward() {
        let state = NEGOTIATING.local_applied();
        assert_eq!(
            state,
            Negotiating {
                local_set: true,
                remote_set: false
            }
        );

        let state = state.remote_applied().local_applied();
        assert_eq!(
            state,
            Negotiating {
                local_set: true,
                remote_set: true
            }
        );
    }

    #[test]
    fn test_connected_requires_both_descriptions() {
        assert_eq!(NEGOTIATING.connected(), NEGOTIATING);
        assert_eq!(NEGOTIATING.local_applied().connected(), NEGOTIATING.local_applied());
        assert_eq!(
            NEGOTIATING.local_applied().remote_applied().connected(),
            Connected
        );
    }

    #[test]
    fn test_connected_does_not_regress() {
        assert_eq!(Connected.local_applied(), Connected);
        assert_eq!(Connected.remote_applied(), Connected);
    }

    #[test]
    fn test_failure_is_reachable_from_anywhere_but_closed() {
        for state in [Created, NEGOTIATING, Connected, Failed] {
            assert_eq!(state.failed(), Failed);
        }
        assert_eq!(Closed.failed(), Closed);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Negotiating {
                local_set: true,
                remote_set: false
            }
            .to_string(),
            "negotiating (local set, remote unset)"
        );
        assert_eq!(Operation::SetRemoteDescription.to_string(), "set_remote_description");
    }
}
