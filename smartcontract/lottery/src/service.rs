// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use std::sync::Arc;

use async_graphql::{EmptySubscription, Object, Request, Response, Schema};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, WithServiceAbi},
    views::View,
    Service, ServiceRuntime,
};
use lottery::{LotteryAbi, LotteryParameters, Operation, ParticipantEntry};
use self::state::LotteryState;

pub struct LotteryService {
    state: Arc<LotteryState>,
    runtime: Arc<ServiceRuntime<Self>>,
}

linera_sdk::service!(LotteryService);

impl WithServiceAbi for LotteryService {
    type Abi = LotteryAbi;
}

impl Service for LotteryService {
    type Parameters = LotteryParameters;

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = LotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryService {
            state: Arc::new(state),
            runtime: Arc::new(runtime),
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
                runtime: self.runtime.clone(),
            },
            MutationRoot {
                runtime: self.runtime.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

struct QueryRoot {
    state: Arc<LotteryState>,
    runtime: Arc<ServiceRuntime<LotteryService>>,
}

#[Object]
impl QueryRoot {
    async fn get_owner(&self) -> Option<AccountOwner> {
        self.state.owner()
    }

    async fn get_total_deposited(&self) -> Amount {
        self.state.total_deposited()
    }

    async fn get_total_tickets(&self) -> u32 {
        self.state.total_tickets()
    }

    async fn get_user_chances(&self, owner: AccountOwner) -> Result<u32, async_graphql::Error> {
        Ok(self.state.user_chances(&owner).await?)
    }

    /// Value of one ticket
    async fn ticket_unit(&self) -> Amount {
        self.runtime.application_parameters().ticket_unit
    }

    /// Participants of the current round with their ticket ranges
    async fn participants(&self) -> Result<Vec<ParticipantEntry>, async_graphql::Error> {
        Ok(self.state.participant_entries().await?)
    }

    /// Owner of `ticket` if the round were drawn now
    async fn resolve_ticket(&self, ticket: u32) -> Result<AccountOwner, async_graphql::Error> {
        Ok(self.state.resolve_winner(ticket).await?)
    }
}

struct MutationRoot {
    runtime: Arc<ServiceRuntime<LotteryService>>,
}

#[Object]
impl MutationRoot {
    /// Deposit `amount` from the signer into the pool
    async fn deposit(&self, amount: String) -> Result<String, async_graphql::Error> {
        let amount = amount.parse::<Amount>()?;
        self.runtime.schedule_operation(&Operation::Deposit { amount });
        Ok("Deposit operation scheduled".to_string())
    }

    /// Pay the pool to the holder of `winner_ticket` (owner only)
    async fn distribute(&self, winner_ticket: u32) -> String {
        self.runtime.schedule_operation(&Operation::Distribute { winner_ticket });
        "Distribute operation scheduled".to_string()
    }

    async fn transfer_ownership(&self, new_owner: AccountOwner) -> String {
        self.runtime.schedule_operation(&Operation::TransferOwnership { new_owner });
        "TransferOwnership operation scheduled".to_string()
    }

    /// Submit a raw op code with a JSON payload
    async fn submit(&self, code: u32, payload: String) -> String {
        self.runtime.schedule_operation(&Operation::Encoded {
            code,
            payload: payload.into_bytes(),
        });
        format!("Operation {} scheduled", code)
    }
}
