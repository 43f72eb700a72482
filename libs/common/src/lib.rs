//! Common library for the session subsystem
//!
//! This crate provides the shared infrastructure used by the auth crate:
//! the session store abstraction, an in-process store implementation,
//! store error types, and a clock abstraction so that expiry behavior can
//! be tested against simulated time.

pub mod clock;
pub mod error;
pub mod memory;
pub mod store;

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        let result = 2 + 2;
        assert_eq!(result, 4);
    }
}
