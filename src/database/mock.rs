//! In-memory [`Database`] for tests: queries are answered by the first
//! unconsumed expectation whose regex matches the statement.

use super::{Database, DatabaseError, Rows, SessionLimit, Value};
use futures::future::BoxFuture;
use regex::Regex;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned answer for one expectation.
#[derive(Debug, Clone)]
pub struct MockResponse {
    result: Result<Rows, String>,
    times: Option<usize>,
    delay: Option<Duration>,
}

impl MockResponse {
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            result: Ok(Rows::new(
                columns.iter().map(|c| (*c).to_string()).collect(),
                rows,
            )),
            times: Some(1),
            delay: None,
        }
    }

    #[must_use]
    pub fn empty(columns: &[&str]) -> Self {
        Self::rows(columns, Vec::new())
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            times: Some(1),
            delay: None,
        }
    }

    /// Answer this many matching queries instead of one.
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Never consumed.
    #[must_use]
    pub const fn repeatedly(mut self) -> Self {
        self.times = None;
        self
    }

    /// Hold the query open for `delay` before answering.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Expectation {
    pattern: Regex,
    response: MockResponse,
    hits: usize,
}

impl Expectation {
    fn available(&self) -> bool {
        self.response.times.is_none_or(|n| self.hits < n)
    }
}

#[derive(Default)]
pub struct MockDatabase {
    expectations: Mutex<Vec<Expectation>>,
    executed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    rejected: AtomicUsize,
    session_limit: Option<SessionLimit>,
    max_sessions: Option<usize>,
}

impl MockDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expectation.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn on(self, pattern: &str, response: MockResponse) -> Result<Self, regex::Error> {
        let pattern = Regex::new(pattern)?;
        if let Ok(mut list) = self.expectations.lock() {
            list.push(Expectation {
                pattern,
                response,
                hits: 0,
            });
        }
        Ok(self)
    }

    /// Queue queries behind a [`SessionLimit`] of `max`, as
    /// [`OracleDatabase`](super::OracleDatabase) does.
    #[must_use]
    pub fn with_session_limit(mut self, max: u32) -> Self {
        self.session_limit = Some(SessionLimit::new(max));
        self
    }

    /// Reject any query that would take more than `max` sessions at once,
    /// like a server that refuses further sessions.
    #[must_use]
    pub const fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Queries refused because every session was taken.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Statements executed so far, in call order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of executed statements matching `pattern`.
    #[must_use]
    pub fn executed_matching(&self, pattern: &str) -> usize {
        Regex::new(pattern).map_or(0, |re| {
            self.executed().iter().filter(|sql| re.is_match(sql)).count()
        })
    }

    /// True when every bounded expectation was fully consumed.
    #[must_use]
    pub fn expectations_met(&self) -> bool {
        self.expectations.lock().is_ok_and(|list| {
            list.iter()
                .all(|e| e.response.times.is_none_or(|n| e.hits >= n))
        })
    }

    /// Highest number of queries observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, sql: &str) -> (Result<Rows, String>, Option<Duration>) {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        let Ok(mut list) = self.expectations.lock() else {
            return (Err("mock state poisoned".to_string()), None);
        };

        match list
            .iter_mut()
            .find(|e| e.available() && e.pattern.is_match(sql))
        {
            Some(expectation) => {
                expectation.hits += 1;
                (
                    expectation.response.result.clone(),
                    expectation.response.delay,
                )
            }
            None => (Err(format!("no expectation matches query: {sql}")), None),
        }
    }
}

impl Database for MockDatabase {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Rows, DatabaseError>> {
        Box::pin(async move {
            let _permit = match &self.session_limit {
                Some(limit) => Some(limit.acquire().await?),
                None => None,
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            if self.max_sessions.is_some_and(|max| now > max) {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.rejected.fetch_add(1, Ordering::SeqCst);
                return Err(DatabaseError::Connection(
                    "ORA-24418: Cannot open further sessions".to_string(),
                ));
            }
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (result, delay) = self.answer(sql);

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            result.map_err(DatabaseError::Query)
        })
    }
}
