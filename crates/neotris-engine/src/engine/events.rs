use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
};

use serde::Serialize;

use crate::{
    core::{PieceKind, PiecePosition, Rotation},
    rules::{ClearPhase, ClearType, Feature, TSpinKind},
};

/// Everything the engine reports to renderers and other observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    PieceSpawned {
        kind: PieceKind,
        position: PiecePosition,
    },
    PieceMoved {
        kind: PieceKind,
        from: PiecePosition,
        to: PiecePosition,
    },
    PieceRotated {
        kind: PieceKind,
        rotation: Rotation,
        wall_kick_used: bool,
        kick_offset: (i32, i32),
    },
    PieceHeld {
        held: PieceKind,
        next: PieceKind,
    },
    PieceLocked {
        kind: PieceKind,
        position: PiecePosition,
        rotation: Rotation,
        t_spin: TSpinKind,
    },
    LinesClear {
        line_count: usize,
        move_type: Option<ClearType>,
        is_special_move: bool,
        cleared_rows: Vec<usize>,
        points: u64,
    },
    ClearPhaseChanged {
        phase: ClearPhase,
    },
    ScoreChanged {
        score: u64,
        delta: u64,
    },
    LevelChanged {
        level: u32,
        previous: u32,
    },
    FeatureUnlocked {
        feature: Feature,
        level: u32,
    },
    GarbageAdded {
        lines: usize,
        overflow: bool,
    },
    GoalReached {
        lines: u64,
    },
    Paused,
    Resumed,
    GameOver {
        score: u64,
        level: u32,
        lines: u64,
    },
    GameReset,
}

impl GameEvent {
    /// The serialized `type` tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PieceSpawned { .. } => "pieceSpawned",
            Self::PieceMoved { .. } => "pieceMoved",
            Self::PieceRotated { .. } => "pieceRotated",
            Self::PieceHeld { .. } => "pieceHeld",
            Self::PieceLocked { .. } => "pieceLocked",
            Self::LinesClear { .. } => "linesClear",
            Self::ClearPhaseChanged { .. } => "clearPhaseChanged",
            Self::ScoreChanged { .. } => "scoreChanged",
            Self::LevelChanged { .. } => "levelChanged",
            Self::FeatureUnlocked { .. } => "featureUnlocked",
            Self::GarbageAdded { .. } => "garbageAdded",
            Self::GoalReached { .. } => "goalReached",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::GameOver { .. } => "gameOver",
            Self::GameReset => "gameReset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Observer of [`GameEvent`]s.
///
/// Listeners run synchronously inside the emitting call. An `Err` or a
/// panic is logged and does not reach the engine or other listeners.
pub trait GameEventListener {
    fn on_event(&mut self, event: &GameEvent) -> Result<(), ListenerError>;
}

impl<F> GameEventListener for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) -> Result<(), ListenerError> {
        self(event);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub emitted: u64,
    pub listener_errors: u64,
    pub listener_panics: u64,
}

/// Fan-out of events to subscribed listeners, in subscription order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Box<dyn GameEventListener>)>,
    next_id: u64,
    stats: EventStats,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl GameEventListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn stats(&self) -> &EventStats {
        &self.stats
    }

    pub fn emit(&mut self, event: &GameEvent) {
        self.stats.emitted += 1;
        for (id, listener) in &mut self.listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.stats.listener_errors += 1;
                    log::error!("listener {id:?} failed on {}: {err}", event.name());
                }
                Err(payload) => {
                    self.stats.listener_panics += 1;
                    let message = payload
                        .downcast_ref::<&str>()
                        .copied()
                        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                        .unwrap_or("non-string panic payload");
                    log::error!("listener {id:?} panicked on {}: {message}", event.name());
                }
            }
        }
    }
}
