// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use linera_sdk::{
    linera_base_types::{Account, AccountOwner, Amount, WithContractAbi},
    views::{RootView, View},
    Contract, ContractRuntime,
};
use lottery::{
    InitialState, LotteryAbi, LotteryError, LotteryParameters, Operation, Response, Treasury,
};
use self::state::LotteryState;

pub struct LotteryContract {
    state: LotteryState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(LotteryContract);

impl WithContractAbi for LotteryContract {
    type Abi = LotteryAbi;
}

impl Contract for LotteryContract {
    type Message = ();
    type Parameters = LotteryParameters;
    type InstantiationArgument = InitialState;
    type EventValue = ();

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = LotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        LotteryContract { state, runtime }
    }

    async fn instantiate(&mut self, initial_state: Self::InstantiationArgument) {
        let params = self.runtime.application_parameters();
        assert!(
            params.ticket_unit > Amount::ZERO,
            "Ticket unit must be greater than zero"
        );

        self.state.initialize(initial_state.owner);
        log::info!(
            "Lottery instantiated with owner {} and ticket unit {}",
            initial_state.owner,
            params.ticket_unit
        );
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Self::Response {
        let code = operation.code();
        match self.dispatch(operation).await {
            Ok(response) => response,
            Err(error) => {
                log::warn!("Operation {} rejected: {}", code, error);
                self.state.rollback();
                panic!("{} (exit code {})", error, error.exit_code());
            }
        }
    }

    async fn execute_message(&mut self, _message: Self::Message) {
        // No messages
    }

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl LotteryContract {
    async fn dispatch(&mut self, operation: Operation) -> Result<Response, LotteryError> {
        let sender = self.runtime.authenticated_signer();
        let ticket_unit = self.runtime.application_parameters().ticket_unit;
        let mut treasury = ChainTreasury {
            runtime: &mut self.runtime,
        };
        self.state
            .apply(sender, operation, ticket_unit, &mut treasury)
            .await
    }
}

/// Keeps the pool in the chain balance: deposits move from the signer's
/// account to the chain, payouts move from the chain to the winner.
struct ChainTreasury<'a> {
    runtime: &'a mut ContractRuntime<LotteryContract>,
}

impl Treasury for ChainTreasury<'_> {
    fn collect(&mut self, from: AccountOwner, amount: Amount) -> Result<(), LotteryError> {
        if self.runtime.owner_balance(from) < amount {
            return Err(LotteryError::InsufficientFunds);
        }
        let pool = Account {
            chain_id: self.runtime.chain_id(),
            owner: AccountOwner::CHAIN,
        };
        self.runtime.transfer(from, pool, amount);
        Ok(())
    }

    fn pay_out(&mut self, to: AccountOwner, amount: Amount) -> Result<(), LotteryError> {
        if to == AccountOwner::CHAIN || self.runtime.chain_balance() < amount {
            return Err(LotteryError::PayoutFailed);
        }
        let winner = Account {
            chain_id: self.runtime.chain_id(),
            owner: to,
        };
        self.runtime.transfer(AccountOwner::CHAIN, winner, amount);
        Ok(())
    }
}
