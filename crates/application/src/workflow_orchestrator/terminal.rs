use rolegate_domain::CommunityMarker;
use rolegate_domain::protocol::sbt;

use super::*;

impl WorkflowOrchestrator {
    /// Reads identifiers produced by a completed registration.
    ///
    /// Read failures are logged and leave the identifier empty; the run already
    /// succeeded on-chain.
    pub(super) async fn terminal_identifiers(
        &self,
        identity: &Identity,
        target: &WorkflowTarget,
    ) -> TerminalIdentifiers {
        match target {
            WorkflowTarget::LaunchCommunity(_) => {
                let community_token = self
                    .read_terminal("community token", || {
                        self.resolver.points_token(identity.address())
                    })
                    .await
                    .flatten();

                let marker = CommunityMarker {
                    community_address: identity.address(),
                    community_token,
                };
                if let Err(error) = self.store.record_community(marker).await {
                    warn!(identity = identity.name(), error = %error, "failed to record community");
                }

                TerminalIdentifiers {
                    community_token,
                    sbt_id: None,
                }
            }
            WorkflowTarget::JoinCommunity { .. } => {
                let sbt_id = match self.addresses.sbt {
                    Some(token) => self
                        .read_terminal("membership token", || async move {
                            let data = self
                                .ledger
                                .read_state(token, sbt::get_user_sbt(identity.address()))
                                .await?;
                            sbt::decode_token_id(&data)
                        })
                        .await
                        .flatten(),
                    None => None,
                };

                TerminalIdentifiers {
                    community_token: None,
                    sbt_id: sbt_id.map(|id| id.to_string()),
                }
            }
            WorkflowTarget::OnboardOperator { .. } => TerminalIdentifiers::default(),
        }
    }

    async fn read_terminal<T, F, Fut>(&self, label: &str, operation: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        match self.step_retry.run(label, operation).await {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(label, error = %error, "terminal identifier read failed");
                None
            }
        }
    }
}
