//! In-memory registry for tests and offline runs
//!
//! Keeps per-owner append-only lock lists and token allowances, mirroring the
//! checks the deployed registry performs. Failures can be scripted per
//! operation and a `list_locks` response can be held back to exercise
//! out-of-order refreshes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use num_bigint::BigUint;
use tokenlock_core::{Address, Lock, LockIndex, RegistryError, TxHash, TxReceipt, UnixSeconds};
use tokio::sync::oneshot;

use crate::{Registry, Result};

/// Registry operations, for scripting failures and counting calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListLocks,
    AuthorizeTransfer,
    CreateLock,
    Withdraw,
}

#[derive(Default)]
struct MemoryState {
    account: Option<Address>,
    now: UnixSeconds,
    locks: HashMap<Address, Vec<Lock>>,
    /// (owner, token) -> remaining allowance granted to the registry
    allowances: HashMap<(Address, Address), BigUint>,
    failures: HashMap<Operation, VecDeque<RegistryError>>,
    calls: HashMap<Operation, usize>,
    held_list: Option<oneshot::Receiver<()>>,
    block_number: u64,
}

pub struct MemoryRegistry {
    registry: Address,
    state: Mutex<MemoryState>,
}

impl MemoryRegistry {
    pub fn new(registry: Address) -> Self {
        Self {
            registry,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Registry with `account` already connected
    pub fn with_account(registry: Address, account: Address) -> Self {
        let memory = Self::new(registry);
        memory.set_account(Some(account));
        memory
    }

    pub fn set_account(&self, account: Option<Address>) {
        self.state().account = account;
    }

    /// Set the registry's notion of the current time
    pub fn set_now(&self, now: UnixSeconds) {
        self.state().now = now;
    }

    /// Append a lock directly to `owner`'s list
    pub fn seed_lock(&self, owner: &Address, lock: Lock) {
        self.state()
            .locks
            .entry(owner.clone())
            .or_default()
            .push(lock);
    }

    pub fn locks_of(&self, owner: &Address) -> Vec<Lock> {
        self.state().locks.get(owner).cloned().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, token: &Address) -> BigUint {
        self.state()
            .allowances
            .get(&(owner.clone(), token.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next call of `op` fail with `err`
    pub fn fail_next(&self, op: Operation, err: RegistryError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Hold the next `list_locks` response until the returned sender fires.
    /// The response still reflects the state at call time.
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state().held_list = Some(rx);
        tx
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Common prologue: count the call, check the session, pop a scripted failure
    fn begin(&self, state: &mut MemoryState, op: Operation) -> Result<Address> {
        *state.calls.entry(op).or_insert(0) += 1;
        let account = state
            .account
            .clone()
            .ok_or_else(|| RegistryError::connection("no wallet session, connect a wallet first"))?;
        if let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(account)
    }

    fn receipt(state: &mut MemoryState) -> TxReceipt {
        state.block_number += 1;
        TxReceipt {
            tx_hash: TxHash::new(format!("0x{:064x}", state.block_number)),
            block_number: state.block_number,
        }
    }
}

fn reverted(reason: &str) -> RegistryError {
    RegistryError::remote_call(format!("execution reverted: {}", reason))
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn registry_address(&self) -> &Address {
        &self.registry
    }

    async fn account(&self) -> Result<Address> {
        self.state()
            .account
            .clone()
            .ok_or_else(|| RegistryError::connection("no wallet session, connect a wallet first"))
    }

    async fn list_locks(&self, owner: &Address) -> Result<Vec<Lock>> {
        let (snapshot, held) = {
            let mut state = self.state();
            self.begin(&mut state, Operation::ListLocks)?;
            let snapshot = state.locks.get(owner).cloned().unwrap_or_default();
            (snapshot, state.held_list.take())
        };

        if let Some(release) = held {
            // A dropped sender releases the response too
            let _ = release.await;
        }
        Ok(snapshot)
    }

    async fn authorize_transfer(
        &self,
        token: &Address,
        spender: &Address,
        amount: &BigUint,
    ) -> Result<TxReceipt> {
        let mut state = self.state();
        let owner = self.begin(&mut state, Operation::AuthorizeTransfer)?;
        if spender != &self.registry {
            return Err(reverted("spender is not the registry"));
        }
        state
            .allowances
            .insert((owner, token.clone()), amount.clone());
        Ok(Self::receipt(&mut state))
    }

    async fn create_lock(
        &self,
        token: &Address,
        amount: &BigUint,
        unlock_time: UnixSeconds,
    ) -> Result<TxReceipt> {
        let mut state = self.state();
        let owner = self.begin(&mut state, Operation::CreateLock)?;

        let key = (owner.clone(), token.clone());
        let allowed = state.allowances.get(&key).cloned().unwrap_or_default();
        if &allowed < amount {
            return Err(reverted("insufficient allowance"));
        }
        state.allowances.insert(key, allowed - amount);

        state.locks.entry(owner).or_default().push(Lock {
            token: token.clone(),
            amount: amount.clone(),
            unlock_time,
            withdrawn: false,
        });
        Ok(Self::receipt(&mut state))
    }

    async fn withdraw(&self, index: LockIndex) -> Result<TxReceipt> {
        let mut state = self.state();
        let owner = self.begin(&mut state, Operation::Withdraw)?;
        let now = state.now;

        let lock = usize::try_from(index)
            .ok()
            .and_then(|i| state.locks.get_mut(&owner)?.get_mut(i))
            .ok_or_else(|| reverted("invalid lock id"))?;
        if lock.withdrawn {
            return Err(reverted("already withdrawn"));
        }
        if now < lock.unlock_time {
            return Err(reverted("tokens are still locked"));
        }
        lock.withdrawn = true;

        Ok(Self::receipt(&mut state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; Address::LEN];
        bytes[Address::LEN - 1] = last;
        Address::from_bytes(bytes)
    }

    #[tokio::test]
    async fn test_lock_requires_allowance() {
        let registry = MemoryRegistry::with_account(addr(0xee), addr(1));
        let token = addr(0xaa);

        let err = registry
            .create_lock(&token, &BigUint::from(10u32), 100)
            .await
            .unwrap_err();
        assert!(err.reason().contains("insufficient allowance"));

        registry
            .authorize_transfer(&token, &addr(0xee), &BigUint::from(10u32))
            .await
            .unwrap();
        registry
            .create_lock(&token, &BigUint::from(10u32), 100)
            .await
            .unwrap();
        assert_eq!(registry.locks_of(&addr(1)).len(), 1);
        assert_eq!(registry.allowance(&addr(1), &token), BigUint::from(0u32));
    }

    #[tokio::test]
    async fn test_withdraw_checks() {
        let registry = MemoryRegistry::with_account(addr(0xee), addr(1));
        registry.seed_lock(
            &addr(1),
            Lock {
                token: addr(0xaa),
                amount: BigUint::from(1u32),
                unlock_time: 1_000,
                withdrawn: false,
            },
        );

        registry.set_now(999);
        assert!(registry.withdraw(0).await.is_err());
        assert!(registry.withdraw(7).await.is_err());

        registry.set_now(1_000);
        registry.withdraw(0).await.unwrap();
        assert!(registry.locks_of(&addr(1))[0].withdrawn);
        assert!(registry.withdraw(0).await.unwrap_err().reason().contains("already"));
    }

    #[tokio::test]
    async fn test_scripted_failure_and_counts() {
        let registry = MemoryRegistry::with_account(addr(0xee), addr(1));
        registry.fail_next(Operation::ListLocks, RegistryError::remote_call("boom"));

        assert!(registry.list_locks(&addr(1)).await.is_err());
        assert!(registry.list_locks(&addr(1)).await.is_ok());
        assert_eq!(registry.calls(Operation::ListLocks), 2);
    }

    #[tokio::test]
    async fn test_no_account_is_connection_error() {
        let registry = MemoryRegistry::new(addr(0xee));
        let err = registry.list_locks(&addr(1)).await.unwrap_err();
        assert_eq!(err.error_code(), "connection_error");
    }
}
