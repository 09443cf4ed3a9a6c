// handlers/mod.rs - 3-tier handler layout
//
// Public (no auth) → Protected (JWT, /api/*) → Elevated (JWT + admin role, /api/admin/*)

pub mod elevated;
pub mod protected;
pub mod public;
