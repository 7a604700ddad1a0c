//! # Session Context
//!
//! One [`AirlineContext`] exists per conversation. Every tool and handoff
//! callback that runs during a turn receives it by mutable reference and
//! updates individual fields; nothing replaces it wholesale.
//!
//! The account number is fixed when the context is created. All other fields
//! start out unset and are filled in as tools and handoffs learn about the
//! booking.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const CONFIRMATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONFIRMATION_LEN: usize = 6;

/// Booking and flight facts shared by every agent in one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirlineContext {
    pub passenger_name: Option<String>,
    pub confirmation_number: Option<String>,
    pub seat_number: Option<String>,
    pub flight_number: Option<String>,
    account_number: String,
}

impl AirlineContext {
    /// Creates a context with a freshly generated account number.
    pub fn new() -> Self {
        Self::with_ids(&RandomBookingIds)
    }

    /// Creates a context drawing its account number from `ids`.
    pub fn with_ids(ids: &dyn BookingIds) -> Self {
        Self::with_account_number(ids.account_number())
    }

    /// Creates a context for a known customer account.
    pub fn with_account_number(account_number: impl Into<String>) -> Self {
        Self {
            passenger_name: None,
            confirmation_number: None,
            seat_number: None,
            flight_number: None,
            account_number: account_number.into(),
        }
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl Default for AirlineContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of the identifiers handoff callbacks and context creation assign.
pub trait BookingIds: Send + Sync {
    /// `FLT-` followed by three digits.
    fn flight_number(&self) -> String;

    /// Six upper-case letters or digits.
    fn confirmation_number(&self) -> String;

    /// Eight digits, never starting with zero.
    fn account_number(&self) -> String;
}

/// [`BookingIds`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBookingIds;

impl BookingIds for RandomBookingIds {
    fn flight_number(&self) -> String {
        flight_number_from(&mut rand::thread_rng())
    }

    fn confirmation_number(&self) -> String {
        confirmation_number_from(&mut rand::thread_rng())
    }

    fn account_number(&self) -> String {
        account_number_from(&mut rand::thread_rng())
    }
}

/// Reproducible [`BookingIds`] for tests and recorded demos.
#[derive(Debug)]
pub struct SeededBookingIds {
    rng: Mutex<StdRng>,
}

impl SeededBookingIds {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

impl BookingIds for SeededBookingIds {
    fn flight_number(&self) -> String {
        self.with_rng(flight_number_from)
    }

    fn confirmation_number(&self) -> String {
        self.with_rng(confirmation_number_from)
    }

    fn account_number(&self) -> String {
        self.with_rng(account_number_from)
    }
}

fn flight_number_from<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("FLT-{}", rng.gen_range(100..=999))
}

fn confirmation_number_from<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CONFIRMATION_LEN)
        .map(|_| CONFIRMATION_ALPHABET[rng.gen_range(0..CONFIRMATION_ALPHABET.len())] as char)
        .collect()
}

fn account_number_from<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(10_000_000u32..=99_999_999).to_string()
}
