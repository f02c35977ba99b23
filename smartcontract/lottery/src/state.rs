// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::linera_base_types::{AccountOwner, Amount};
use linera_sdk::views::{
    linera_views, LogView, MapView, RegisterView, RootView, View, ViewStorageContext,
};
use lottery::{tickets_for, LotteryError, Operation, ParticipantEntry, Response, Treasury};

/// The lottery ledger.
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct LotteryState {
    /// Account allowed to distribute prizes and transfer ownership.
    pub owner: RegisterView<Option<AccountOwner>>,
    /// Raw value deposited since the last distribution, remainders included.
    pub total_deposited: RegisterView<Amount>,
    /// Sum of all participant chances.
    pub total_tickets: RegisterView<u32>,
    /// Participants in first-deposit order. Ticket ranges are laid out in this order.
    pub participants: LogView<AccountOwner>,
    /// Tickets held by each participant. Never holds a zero entry.
    pub chances: MapView<AccountOwner, u32>,
}

#[allow(dead_code)]
impl LotteryState {
    pub fn initialize(&mut self, owner: AccountOwner) {
        self.owner.set(Some(owner));
        self.total_deposited.set(Amount::ZERO);
        self.total_tickets.set(0);
    }

    /// Routes one operation to its handler after checking the sender's rights.
    ///
    /// Handlers check every precondition before writing to a view, so a failed
    /// operation leaves the staged state as it found it.
    pub async fn apply(
        &mut self,
        sender: Option<AccountOwner>,
        operation: Operation,
        ticket_unit: Amount,
        treasury: &mut impl Treasury,
    ) -> Result<Response, LotteryError> {
        let operation = match operation {
            Operation::Encoded { code, payload } => Operation::decode(code, &payload)?,
            operation => operation,
        };

        match operation {
            Operation::Deposit { amount } => {
                let sender = sender.ok_or(LotteryError::Unauthorized)?;
                let awarded = self.deposit(sender, amount, ticket_unit, treasury).await?;
                Ok(Response::Deposited {
                    awarded,
                    total_tickets: *self.total_tickets.get(),
                })
            }
            Operation::Distribute { winner_ticket } => {
                self.ensure_owner(sender)?;
                let (winner, prize) = self.distribute(winner_ticket, treasury).await?;
                Ok(Response::PrizeDistributed {
                    winner_ticket,
                    winner,
                    prize,
                })
            }
            Operation::TransferOwnership { new_owner } => {
                self.ensure_owner(sender)?;
                self.transfer_ownership(new_owner);
                Ok(Response::Ok)
            }
            Operation::Encoded { code, .. } => Err(LotteryError::UnsupportedOperation(code)),
        }
    }

    pub fn ensure_owner(&self, sender: Option<AccountOwner>) -> Result<(), LotteryError> {
        match (sender, *self.owner.get()) {
            (Some(sender), Some(owner)) if sender == owner => Ok(()),
            _ => Err(LotteryError::Unauthorized),
        }
    }

    /// Credits a deposit and returns the number of tickets it bought.
    pub async fn deposit(
        &mut self,
        sender: AccountOwner,
        amount: Amount,
        ticket_unit: Amount,
        treasury: &mut impl Treasury,
    ) -> Result<u32, LotteryError> {
        let awarded = tickets_for(amount, ticket_unit)?;
        let total_deposited = self
            .total_deposited
            .get()
            .try_add(amount)
            .map_err(|_| LotteryError::ArithmeticOverflow)?;
        let total_tickets = self
            .total_tickets
            .get()
            .checked_add(awarded)
            .ok_or(LotteryError::ArithmeticOverflow)?;
        let previous = self.chances.get(&sender).await?;
        let chances = previous
            .unwrap_or(0)
            .checked_add(awarded)
            .ok_or(LotteryError::ArithmeticOverflow)?;

        if amount > Amount::ZERO {
            treasury.collect(sender, amount)?;
        }

        self.total_deposited.set(total_deposited);
        if awarded > 0 {
            if previous.is_none() {
                self.participants.push(sender);
            }
            self.chances.insert(&sender, chances)?;
            self.total_tickets.set(total_tickets);
        }

        log::info!(
            "Deposit of {} from {}: {} ticket(s), {} in pool",
            amount,
            sender,
            awarded,
            total_deposited
        );
        Ok(awarded)
    }

    /// Finds the participant whose ticket range contains `winner_ticket`.
    pub async fn resolve_winner(&self, winner_ticket: u32) -> Result<AccountOwner, LotteryError> {
        let total = *self.total_tickets.get();
        if total == 0 {
            return Err(LotteryError::EmptyPool);
        }
        if winner_ticket >= total {
            return Err(LotteryError::TicketOutOfRange {
                ticket: winner_ticket,
                total,
            });
        }

        let mut range_end = 0u32;
        for owner in self.participants.read(0..self.participants.count()).await? {
            range_end += self.chances.get(&owner).await?.unwrap_or(0);
            if winner_ticket < range_end {
                return Ok(owner);
            }
        }
        // Ranges cover `0..total` exactly while the ledger is consistent.
        Err(LotteryError::TicketOutOfRange {
            ticket: winner_ticket,
            total,
        })
    }

    /// Pays the whole pool to the holder of `winner_ticket`, then starts a new round.
    pub async fn distribute(
        &mut self,
        winner_ticket: u32,
        treasury: &mut impl Treasury,
    ) -> Result<(AccountOwner, Amount), LotteryError> {
        let winner = self.resolve_winner(winner_ticket).await?;
        let prize = *self.total_deposited.get();

        treasury.pay_out(winner, prize)?;
        self.reset();

        log::info!(
            "Ticket {} won by {}: {} paid out",
            winner_ticket,
            winner,
            prize
        );
        Ok((winner, prize))
    }

    pub fn transfer_ownership(&mut self, new_owner: AccountOwner) {
        if let Some(previous) = self.owner.get() {
            log::info!("Ownership transferred from {} to {}", previous, new_owner);
        }
        self.owner.set(Some(new_owner));
    }

    fn reset(&mut self) {
        self.total_deposited.set(Amount::ZERO);
        self.total_tickets.set(0);
        self.participants.clear();
        self.chances.clear();
    }

    pub fn owner(&self) -> Option<AccountOwner> {
        *self.owner.get()
    }

    pub fn total_deposited(&self) -> Amount {
        *self.total_deposited.get()
    }

    pub fn total_tickets(&self) -> u32 {
        *self.total_tickets.get()
    }

    pub async fn user_chances(&self, owner: &AccountOwner) -> Result<u32, LotteryError> {
        Ok(self.chances.get(owner).await?.unwrap_or(0))
    }

    /// All participants with their ticket ranges, in range order.
    pub async fn participant_entries(&self) -> Result<Vec<ParticipantEntry>, LotteryError> {
        let owners = self.participants.read(0..self.participants.count()).await?;
        let mut entries = Vec::with_capacity(owners.len());
        let mut first_ticket = 0u32;

        for owner in owners {
            let chances = self.chances.get(&owner).await?.unwrap_or(0);
            if chances == 0 {
                continue;
            }
            entries.push(ParticipantEntry {
                owner,
                chances,
                first_ticket,
                last_ticket: first_ticket + chances - 1,
            });
            first_ticket += chances;
        }
        Ok(entries)
    }
}
