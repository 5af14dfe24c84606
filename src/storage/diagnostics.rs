//! Diagnostics reporting

use log::warn;

use crate::storage::backend::Backend;
use crate::storage::operations::SdLogger;
use crate::storage::results::Diagnostics;

impl<B: Backend> SdLogger<B> {
    /// Current mount state and capacity, for operators.
    ///
    /// Safe in any state: an unmounted card reports `NONE` and zeros without
    /// touching the backend.
    pub fn describe(&mut self) -> Diagnostics {
        let state = self.state();
        if !state.card_mounted {
            return Diagnostics {
                mounted: false,
                card_type: state.card_type.to_string(),
                total_bytes: 0,
                free_bytes: 0,
            };
        }

        let (total_bytes, free_bytes) = match self.mount_manager().capacity() {
            Ok(snapshot) => (snapshot.total_bytes, snapshot.free_bytes),
            Err(e) => {
                warn!("Capacity unavailable for diagnostics: {}", e);
                (0, 0)
            }
        };

        Diagnostics {
            mounted: true,
            card_type: state.card_type.to_string(),
            total_bytes,
            free_bytes,
        }
    }
}
