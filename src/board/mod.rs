//! Hiring Board: client-side state engine for a candidate kanban board.
//!
//! ## Overview
//!
//! Candidates for a job move through four ordered columns (new, interview,
//! hired, rejected). The board keeps a paginated per-column view, computes
//! fractional positions for drag-and-drop, applies moves optimistically with
//! rollback on server refusal, and folds in live changes made by other
//! people viewing the same job.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  gestures  ┌───────────────────────────────────────────────┐
//! │ CLI / UI │ ─────────> │  store.rs  (BoardStore, BoardSnapshot)        │
//! │          │ <───────── │    ├─ position.rs  allocate()                 │
//! └──────────┘  revision  │    ├─ columns.rs   project() → [Column; 4]    │
//!                         │    └─ reconcile.rs reconcile() (pure reducer) │
//!                         │         ^                    │                │
//!                         │         │ mpsc queue         │ CandidateGateway
//!                         │         │                    v                │
//!                         │  live.rs (LiveChannel)    gateway.rs          │
//!                         │    └─ events.rs (SseDecoder)  (HttpGateway)   │
//!                         └───────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                              |
//! |-----------|-------------------------------------------------------------|
//! | `models`  | Wire types: `Candidate`, `CandidateStatus`, `Job`, pages    |
//! | `events`  | `CandidateEvent` payload + `text/event-stream` framing      |
//! | `create`  | `CandidateForm` validation and submission                   |

pub mod columns;
pub mod create;
pub mod events;
pub mod gateway;
pub mod live;
pub mod models;
pub mod position;
pub mod reconcile;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use columns::{Column, project};
pub use gateway::{CandidateGateway, CandidateUpdate, HttpGateway};
pub use live::{ChannelState, HttpEventSource, LiveChannel, LiveChannelHandle, ReconnectPolicy};
pub use models::{Candidate, CandidateStatus, Job, SessionUser};
pub use store::{BoardSnapshot, BoardStore, MoveOutcome};
