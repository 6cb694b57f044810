//! Locker occupancy and rental sessions
//!
//! The manager exclusively owns the occupancy map and the active-session
//! map together with their JSON documents. Every mutation goes through its
//! methods and is persisted after the in-memory change; a failed write is
//! logged and never changes an operation's result.

use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{clock::Clock, config::KioskConfig, store::JsonFile, Error, Result};

/// Digits in a generated personal access code
pub const ACCESS_CODE_LENGTH: usize = 4;

/// Locker number, `1..=count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockerId(u32);

impl LockerId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for LockerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LockerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LockerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|e| Error::Validation(format!("Invalid locker id '{s}': {e}")))
    }
}

/// One rental occupying a locker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockerSession {
    pub locker_id: LockerId,
    /// Code the user types to reopen the locker
    pub user_code: String,
    #[serde(with = "crate::timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "crate::timestamp::option", default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub is_active: bool,
}

impl LockerSession {
    /// Open a session starting at `start`
    #[must_use]
    pub fn new(
        locker_id: LockerId,
        user_code: impl Into<String>,
        start: DateTime<Utc>,
        payment_method: impl Into<String>,
        amount_paid: f64,
    ) -> Self {
        Self {
            locker_id,
            user_code: user_code.into(),
            start_time: start,
            end_time: None,
            payment_method: payment_method.into(),
            amount_paid,
            is_active: true,
        }
    }

    /// Time since the session started
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }

    /// Whether the session has run strictly longer than `timeout`
    ///
    /// Compares total elapsed seconds.
    #[must_use]
    pub fn is_timed_out(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.elapsed(now).num_seconds() > timeout.num_seconds()
    }
}

/// Counts for the status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    pub available: usize,
    pub occupied: usize,
    pub total: usize,
}

/// Tracks which lockers are occupied and by which session
pub struct LockerManager {
    master_code: String,
    session_timeout: Duration,
    clock: Arc<dyn Clock>,
    occupancy: BTreeMap<LockerId, bool>,
    sessions: BTreeMap<LockerId, LockerSession>,
    occupancy_file: JsonFile<BTreeMap<String, bool>>,
    sessions_file: JsonFile<Vec<LockerSession>>,
}

impl std::fmt::Debug for LockerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockerManager")
            .field("occupancy", &self.occupancy)
            .field("sessions", &self.sessions.len())
            .field("occupancy_file", &self.occupancy_file.path())
            .field("sessions_file", &self.sessions_file.path())
            .finish_non_exhaustive()
    }
}

impl LockerManager {
    /// Load persisted state for the configured lockers
    ///
    /// Ids `1..=lockers.count` missing from the occupancy file start free;
    /// ids the file knows beyond that range are kept. Only sessions marked
    /// active are reloaded.
    #[must_use]
    pub fn open(config: &KioskConfig, clock: Arc<dyn Clock>) -> Self {
        let occupancy_file: JsonFile<BTreeMap<String, bool>> = JsonFile::new(config.lockers_path());
        let sessions_file: JsonFile<Vec<LockerSession>> = JsonFile::new(config.sessions_path());

        let mut occupancy: BTreeMap<LockerId, bool> = BTreeMap::new();
        for (key, occupied) in occupancy_file.load().unwrap_or_default() {
            match key.parse::<LockerId>() {
                Ok(id) => {
                    occupancy.insert(id, occupied);
                }
                Err(e) => tracing::warn!(
                    target: "kiosk::locker",
                    key = %key,
                    error = %e,
                    "Ignoring malformed locker entry"
                ),
            }
        }
        for id in 1..=config.lockers.count {
            occupancy.entry(LockerId(id)).or_insert(false);
        }

        let sessions: BTreeMap<LockerId, LockerSession> = sessions_file
            .load()
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| (s.locker_id, s))
            .collect();

        for id in sessions.keys() {
            let occupied = occupancy.entry(*id).or_insert(false);
            if !*occupied {
                tracing::warn!(
                    target: "kiosk::locker",
                    locker_id = %id,
                    "Active session on a locker recorded as free, marking occupied"
                );
                *occupied = true;
            }
        }

        tracing::info!(
            target: "kiosk::locker",
            lockers = occupancy.len(),
            active_sessions = sessions.len(),
            "Locker state loaded"
        );

        Self {
            master_code: config.security.master_code.clone(),
            session_timeout: config.session_timeout(),
            clock,
            occupancy,
            sessions,
            occupancy_file,
            sessions_file,
        }
    }

    /// All free lockers
    #[must_use]
    pub fn list_available(&self) -> BTreeSet<LockerId> {
        self.occupancy
            .iter()
            .filter(|(_, occupied)| !**occupied)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether `id` is free; unknown ids count as occupied
    #[must_use]
    pub fn is_available(&self, id: LockerId) -> bool {
        !self.occupancy.get(&id).copied().unwrap_or(true)
    }

    /// Whether `id` is a locker this kiosk knows
    #[must_use]
    pub fn exists(&self, id: LockerId) -> bool {
        self.occupancy.contains_key(&id)
    }

    /// Every known locker with its occupied flag, by id
    pub fn lockers(&self) -> impl Iterator<Item = (LockerId, bool)> + '_ {
        self.occupancy.iter().map(|(id, occupied)| (*id, *occupied))
    }

    /// Start a rental on a free locker
    ///
    /// Returns `false` if the locker is not available or `amount` is not a
    /// non-negative number.
    pub fn reserve(
        &mut self,
        id: LockerId,
        user_code: &str,
        payment_method: &str,
        amount: f64,
    ) -> bool {
        if !self.is_available(id) {
            tracing::warn!(
                target: "kiosk::locker",
                locker_id = %id,
                "Reservation refused, locker not available"
            );
            return false;
        }
        if !amount.is_finite() || amount < 0.0 {
            tracing::warn!(
                target: "kiosk::locker",
                locker_id = %id,
                amount,
                "Reservation refused, invalid amount"
            );
            return false;
        }

        let session = LockerSession::new(id, user_code, self.clock.now(), payment_method, amount);
        self.occupancy.insert(id, true);
        self.sessions.insert(id, session);

        self.persist();

        tracing::info!(
            target: "kiosk::locker",
            locker_id = %id,
            payment_method,
            amount,
            "Locker reserved"
        );
        true
    }

    /// Authorize a physical unlock
    ///
    /// The master code opens any known locker regardless of session state;
    /// otherwise the code must match the locker's active session. Nothing
    /// is released.
    #[must_use]
    pub fn unlock(&self, id: LockerId, code: &str) -> bool {
        if code == self.master_code && self.exists(id) {
            tracing::info!(target: "kiosk::locker", locker_id = %id, "Locker opened with master code");
            return true;
        }

        if self
            .sessions
            .get(&id)
            .is_some_and(|s| s.is_active && s.user_code == code)
        {
            tracing::info!(target: "kiosk::locker", locker_id = %id, "Locker opened with user code");
            return true;
        }

        tracing::warn!(target: "kiosk::locker", locker_id = %id, "Unlock attempt rejected");
        false
    }

    /// Admin override: open a locker with the configured master code
    #[must_use]
    pub fn force_open(&self, id: LockerId) -> bool {
        self.unlock(id, &self.master_code)
    }

    /// End the active session on `id` and free the locker
    pub fn release(&mut self, id: LockerId) -> bool {
        self.close(id).is_some()
    }

    /// End the active session on `id`, returning the closed record
    pub fn close(&mut self, id: LockerId) -> Option<LockerSession> {
        let Some(mut session) = self.sessions.remove(&id) else {
            tracing::warn!(target: "kiosk::locker", locker_id = %id, "Release refused, no active session");
            return None;
        };

        session.end_time = Some(self.clock.now());
        session.is_active = false;
        self.occupancy.insert(id, false);

        self.persist();

        tracing::info!(
            target: "kiosk::locker",
            locker_id = %id,
            duration_secs = session.end_time.map_or(0, |end| (end - session.start_time).num_seconds()),
            "Locker released"
        );
        Some(session)
    }

    /// Active session on `id`, if any
    #[must_use]
    pub fn session_info(&self, id: LockerId) -> Option<&LockerSession> {
        self.sessions.get(&id)
    }

    /// Active sessions ordered by locker id
    #[must_use]
    pub fn active_sessions(&self) -> Vec<&LockerSession> {
        self.sessions.values().collect()
    }

    /// Release every session that has run longer than `timeout`
    ///
    /// Returns the released lockers.
    pub fn sweep_expired(&mut self, timeout: Duration) -> Vec<LockerId> {
        let now = self.clock.now();
        let expired: Vec<LockerId> = self
            .sessions
            .values()
            .filter(|s| s.is_timed_out(now, timeout))
            .map(|s| s.locker_id)
            .collect();

        for id in &expired {
            tracing::warn!(target: "kiosk::locker", locker_id = %id, "Session timed out");
            self.release(*id);
        }
        expired
    }

    /// [`sweep_expired`](Self::sweep_expired) with `security.session_timeout`
    pub fn sweep_expired_default(&mut self) -> Vec<LockerId> {
        self.sweep_expired(self.session_timeout)
    }

    /// Release every active session, returning how many were released
    pub fn release_all(&mut self) -> usize {
        let ids: Vec<LockerId> = self.sessions.keys().copied().collect();
        ids.into_iter().filter(|id| self.release(*id)).count()
    }

    /// Free / occupied / total counts
    #[must_use]
    pub fn occupancy(&self) -> OccupancySummary {
        let occupied = self.occupancy.values().filter(|o| **o).count();
        OccupancySummary {
            available: self.occupancy.len() - occupied,
            occupied,
            total: self.occupancy.len(),
        }
    }

    /// Random personal access code for rentals that did not choose one
    #[must_use]
    pub fn generate_access_code() -> String {
        let mut rng = OsRng;
        (0..ACCESS_CODE_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn persist(&self) {
        let occupancy: BTreeMap<String, bool> = self
            .occupancy
            .iter()
            .map(|(id, occupied)| (id.to_string(), *occupied))
            .collect();
        self.occupancy_file.save_or_log(&occupancy);

        let sessions: Vec<LockerSession> = self.sessions.values().cloned().collect();
        self.sessions_file.save_or_log(&sessions);
    }
}
