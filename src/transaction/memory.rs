//! 메모리 기반 트랜잭션 리소스
//!
//! 트랜잭션마다 쓰기 버퍼(journal)를 두고, 커밋 시점에만 커밋된 저장소에 반영합니다.
//! 세이브포인트는 버퍼의 스냅샷입니다. 테스트와 데모 바이너리에서 실제 DB 대신 사용합니다.
//!
//! 읽기/쓰기는 [`current_transaction`]을 보고 현재 트랜잭션의 버퍼로 향하며,
//! 트랜잭션이 없으면 즉시 커밋(autocommit)됩니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use crate::core::errors::{poisoned, ContainerError, ContainerResult};
use crate::transaction::coordinator::current_transaction;
use crate::transaction::resource::{Transaction, TransactionResource};

/// `None`은 삭제를 의미합니다.
type Writes = BTreeMap<String, Option<Value>>;

#[derive(Default)]
struct Journal {
    writes: Writes,
    savepoints: Vec<(String, Writes)>,
}

impl Journal {
    fn savepoint_position(&self, name: &str) -> ContainerResult<usize> {
        self.savepoints
            .iter()
            .position(|(savepoint, _)| savepoint == name)
            .ok_or_else(|| ContainerError::Resource(format!("savepoint not found: {name}")))
    }
}

/// 커밋된 키-값 저장소와 트랜잭션별 쓰기 버퍼
#[derive(Default)]
pub struct MemoryResource {
    committed: RwLock<BTreeMap<String, Value>>,
    journals: Mutex<HashMap<Uuid, Journal>>,
    events: Mutex<Vec<String>>,
    fail_commits: AtomicBool,
}

impl MemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 씁니다. 읽기 전용 트랜잭션 안에서는 실패합니다.
    pub fn put(&self, key: impl Into<String>, value: Value) -> ContainerResult<()> {
        self.write(key.into(), Some(value))
    }

    pub fn delete(&self, key: &str) -> ContainerResult<()> {
        self.write(key.to_string(), None)
    }

    /// 현재 트랜잭션에서 보이는 값 (버퍼 → 커밋된 값 순서)
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(transaction) = current_transaction() {
            let journals = self.journals.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(written) = journals.get(&transaction.id()).and_then(|journal| journal.writes.get(key)) {
                return written.clone();
            }
        }
        self.committed_value(key)
    }

    /// 커밋된 값만 조회합니다.
    pub fn committed_value(&self, key: &str) -> Option<Value> {
        let committed = self.committed.read().unwrap_or_else(|e| e.into_inner());
        committed.get(key).cloned()
    }

    pub fn committed(&self) -> BTreeMap<String, Value> {
        self.committed.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 리소스가 받은 호출 기록 (`begin <id>`, `savepoint <name>` 등)
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 아직 커밋/롤백되지 않은 트랜잭션 수
    pub fn active_transactions(&self) -> usize {
        self.journals.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 이후의 커밋이 실패하도록 합니다.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn write(&self, key: String, value: Option<Value>) -> ContainerResult<()> {
        let Some(transaction) = current_transaction() else {
            let mut committed = self.committed.write().map_err(poisoned)?;
            match value {
                Some(value) => committed.insert(key, value),
                None => committed.remove(&key),
            };
            return Ok(());
        };

        if transaction.is_read_only() {
            return Err(ContainerError::Resource(format!(
                "cannot write '{key}' in read-only transaction {}",
                transaction.id()
            )));
        }

        let mut journals = self.journals.lock().map_err(poisoned)?;
        let journal = journals.get_mut(&transaction.id()).ok_or_else(|| {
            ContainerError::Resource(format!("transaction {} is not enlisted in memory resource", transaction.id()))
        })?;
        journal.writes.insert(key, value);
        Ok(())
    }

    fn record(&self, event: String) {
        log::trace!("memory resource: {event}");
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    fn with_journal<R>(
        &self,
        transaction: &Transaction,
        f: impl FnOnce(&mut Journal) -> ContainerResult<R>,
    ) -> ContainerResult<R> {
        let mut journals = self.journals.lock().map_err(poisoned)?;
        let journal = journals
            .get_mut(&transaction.id())
            .ok_or_else(|| ContainerError::Resource(format!("unknown transaction {}", transaction.id())))?;
        f(journal)
    }
}

impl TransactionResource for MemoryResource {
    fn name(&self) -> &str {
        "memory"
    }

    fn begin(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.journals
            .lock()
            .map_err(poisoned)?
            .insert(transaction.id(), Journal::default());
        self.record(format!("begin {}", transaction.id()));
        Ok(())
    }

    fn commit(&self, transaction: &Transaction) -> ContainerResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ContainerError::Resource(format!("commit of {} rejected", transaction.id())));
        }

        let journal = self
            .journals
            .lock()
            .map_err(poisoned)?
            .remove(&transaction.id())
            .ok_or_else(|| ContainerError::Resource(format!("unknown transaction {}", transaction.id())))?;

        let mut committed = self.committed.write().map_err(poisoned)?;
        for (key, value) in journal.writes {
            match value {
                Some(value) => committed.insert(key, value),
                None => committed.remove(&key),
            };
        }
        drop(committed);

        self.record(format!("commit {}", transaction.id()));
        Ok(())
    }

    fn rollback(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.journals.lock().map_err(poisoned)?.remove(&transaction.id());
        self.record(format!("rollback {}", transaction.id()));
        Ok(())
    }

    fn create_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()> {
        self.with_journal(transaction, |journal| {
            let snapshot = journal.writes.clone();
            journal.savepoints.push((name.to_string(), snapshot));
            Ok(())
        })?;
        self.record(format!("savepoint {name}"));
        Ok(())
    }

    fn rollback_to_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()> {
        self.with_journal(transaction, |journal| {
            let position = journal.savepoint_position(name)?;
            let mut discarded = journal.savepoints.split_off(position);
            let (_, snapshot) = discarded.swap_remove(0);
            journal.writes = snapshot;
            Ok(())
        })?;
        self.record(format!("rollback_to {name}"));
        Ok(())
    }

    fn release_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()> {
        self.with_journal(transaction, |journal| {
            let position = journal.savepoint_position(name)?;
            journal.savepoints.truncate(position);
            Ok(())
        })?;
        self.record(format!("release {name}"));
        Ok(())
    }

    fn suspend(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.record(format!("suspend {}", transaction.id()));
        Ok(())
    }

    fn resume(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.record(format!("resume {}", transaction.id()));
        Ok(())
    }
}
