use std::collections::VecDeque;
use tracing::{debug, info};

use crate::audio::track::Track;

/// Cola de tracks pendientes de un servidor, estrictamente FIFO.
///
/// El track cargado en el transporte nunca vive aquí; la sesión lo saca
/// con [`TrackQueue::next_track`].
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega tracks al final en el orden dado
    pub fn add_tracks(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        if added > 0 {
            info!("➕ Agregados {} tracks a la cola", added);
        }
        added
    }

    /// Saca el primer track de la cola
    pub fn next_track(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => info!("➡️ Siguiente en la cola: {}", track.title),
            None => debug!("📭 Cola vacía"),
        }
        next
    }

    /// Vacía la cola y devuelve cuántos tracks se eliminaron
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        if removed > 0 {
            info!("🗑️ Cola limpiada: {} tracks removidos", removed);
        }
        removed
    }

    /// Hasta `limit` tracks desde el inicio, sin consumirlos
    pub fn list(&self, limit: usize) -> Vec<Track> {
        self.items.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
