//! In-memory stand-ins for the database and broker, used by unit and router tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use time::PrimitiveDateTime;
use tokio::sync::{watch, Notify};

use crate::auth::{jwt::JwtKeys, password::CredentialHasher};
use crate::config::{JwtConfig, PasswordConfig};
use crate::readings::{repo::ReadingRepo, repo_types::Reading};
use crate::state::AppState;
use crate::transport::SensorPublisher;
use crate::users::{
    repo::{RepoError, UserRepo},
    repo_types::{User, UserFields},
    services::UserService,
};

/// Argon2 with the smallest legal cost so tests stay fast.
pub fn fast_hasher() -> CredentialHasher {
    CredentialHasher::new(&PasswordConfig {
        memory_kib: 64,
        iterations: 1,
    })
    .expect("hasher")
}

pub fn test_jwt() -> JwtKeys {
    JwtKeys::from_config(&JwtConfig {
        secret: "test-secret".into(),
        algorithm: Algorithm::HS256,
        ttl_minutes: 5,
    })
}

#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Vec<User>>,
    next_id: Mutex<i32>,
    fail_next: AtomicBool,
}

impl MemoryUserRepo {
    /// Makes the next insert or update fail like a lost connection.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }

    fn check_failure(&self) -> Result<(), RepoError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Other(anyhow::anyhow!("connection reset")));
        }
        Ok(())
    }

    fn email_taken(rows: &[User], email: &str, except: Option<i32>) -> bool {
        rows.iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: i32) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|u| u.name == name)
            .min_by_key(|u| u.id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, fields: UserFields) -> Result<User, RepoError> {
        self.check_failure()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &fields.email, None) {
            return Err(RepoError::UniqueViolation);
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let user = User {
            id: *next_id,
            name: fields.name,
            email: fields.email,
            hashed_password: fields.hashed_password,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: i32, fields: UserFields) -> Result<Option<User>, RepoError> {
        self.check_failure()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &fields.email, Some(id)) {
            return Err(RepoError::UniqueViolation);
        }
        let Some(user) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.name = fields.name;
        user.email = fields.email;
        user.hashed_password = fields.hashed_password;
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i32) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok(rows.len() != before)
    }
}

pub struct MemoryReadingRepo {
    rows: Mutex<Vec<Reading>>,
    fail_next: AtomicBool,
    held: watch::Sender<bool>,
    pending: Notify,
}

impl Default for MemoryReadingRepo {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
            held: watch::channel(false).0,
            pending: Notify::new(),
        }
    }
}

impl MemoryReadingRepo {
    pub fn readings(&self) -> Vec<Reading> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_next_insert(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Inserts block until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.held.send_replace(true);
    }

    pub fn release_writes(&self) {
        self.held.send_replace(false);
    }

    /// Resolves once an insert is parked on the hold.
    pub async fn wait_for_pending_write(&self) {
        self.pending.notified().await;
    }
}

#[async_trait]
impl ReadingRepo for MemoryReadingRepo {
    async fn insert(&self, value: f64, timestamp: PrimitiveDateTime) -> anyhow::Result<Reading> {
        let held = *self.held.borrow();
        if held {
            let mut released = self.held.subscribe();
            self.pending.notify_one();
            released.wait_for(|held| !*held).await.map(|_| ())?;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("database unavailable");
        }
        let mut rows = self.rows.lock().unwrap();
        let reading = Reading {
            id: rows.len() as i32 + 1,
            value,
            timestamp,
        };
        rows.push(reading.clone());
        Ok(reading)
    }
}

/// Records every payload instead of talking to a broker.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_publishes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl SensorPublisher for RecordingPublisher {
    fn publish(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("broker unreachable");
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub users: Arc<MemoryUserRepo>,
    pub readings: Arc<MemoryReadingRepo>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn test_state() -> TestHarness {
    let users = Arc::new(MemoryUserRepo::default());
    let readings = Arc::new(MemoryReadingRepo::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let state = AppState::from_parts(
        UserService::new(users.clone(), fast_hasher()),
        readings.clone(),
        publisher.clone(),
        test_jwt(),
    );
    TestHarness {
        state,
        users,
        readings,
        publisher,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, email: &str) -> UserFields {
        UserFields {
            name: name.into(),
            email: email.into(),
            hashed_password: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn memory_repo_finds_by_email_and_first_name_match() {
        let repo = MemoryUserRepo::default();
        let first = repo.insert(fields("sam", "sam1@x.io")).await.unwrap();
        repo.insert(fields("sam", "sam2@x.io")).await.unwrap();

        assert_eq!(repo.find_by_name("sam").await.unwrap(), Some(first.clone()));
        let by_email = repo.find_by_email("sam2@x.io").await.unwrap().unwrap();
        assert_eq!(by_email.name, "sam");
        assert_ne!(by_email.id, first.id);
        assert!(repo.find_by_email("nobody@x.io").await.unwrap().is_none());
    }
}
