//! Simulated room scanner.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use colocate_core::{env::Environment, room::RoomSnapshot, services::RoomScanner};
use tracing::debug;

/// What the capture flow does when asked.
#[derive(Debug, Clone)]
pub enum Capture {
    /// User finishes scanning after `after`, producing `room`.
    Completes {
        /// Captured room.
        room: RoomSnapshot,
        /// Time the user takes.
        after: Duration,
    },
    /// User cancels after `after`.
    Cancelled {
        /// Time before cancelling.
        after: Duration,
    },
}

/// Device room scan with a scripted capture flow.
#[derive(Debug, Clone)]
pub struct SimRoomScanner<E> {
    room: Arc<Mutex<Option<RoomSnapshot>>>,
    capture: Capture,
    env: E,
}

impl<E: Environment> SimRoomScanner<E> {
    /// Scanner that already holds `room`.
    pub fn with_room(room: RoomSnapshot, env: E) -> Self {
        Self {
            capture: Capture::Completes { room: room.clone(), after: Duration::ZERO },
            room: Arc::new(Mutex::new(Some(room))),
            env,
        }
    }

    /// Scanner with no room whose capture flow behaves as `capture`.
    pub fn empty(capture: Capture, env: E) -> Self {
        Self { room: Arc::new(Mutex::new(None)), capture, env }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RoomSnapshot>> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<E: Environment> RoomScanner for SimRoomScanner<E> {
    fn has_room(&self) -> bool {
        self.lock().is_some()
    }

    fn current_room(&self) -> Option<RoomSnapshot> {
        self.lock().clone()
    }

    async fn request_capture(&self) -> bool {
        match &self.capture {
            Capture::Completes { room, after } => {
                self.env.sleep(*after).await;
                *self.lock() = Some(room.clone());
                debug!(room_id = %room.room_id, "capture completed");
                true
            },
            Capture::Cancelled { after } => {
                self.env.sleep(*after).await;
                debug!("capture cancelled");
                false
            },
        }
    }
}
