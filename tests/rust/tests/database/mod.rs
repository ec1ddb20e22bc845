//! SQLite storage tests
//!
//! Migrations, and the application services running on the SQLite
//! repositories instead of mocks.
