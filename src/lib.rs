mod api;
mod balancer;
mod error;
mod logging;
mod roster;
mod rotation;
mod session;
mod types;

pub use balancer::{TeamBalancer, NOTE_EXTRA_GOALKEEPER, NOTE_NO_GOALKEEPER};
pub use error::{FormationError, FormationResult};
pub use roster::{
    resolve_roster, FormationSink, InMemoryDirectory, PositionPreferences, PreferenceStore, Profile,
    ProfileLookup, ResolvedRoster,
};
pub use rotation::{next_position, RotationState};
pub use session::{FormationOutcome, FormationRequest, FormationSession};
pub use types::*;

use wasm_bindgen::prelude::*;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init();
}

fn to_js_error(err: FormationError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// WASM-exposed formation engine
#[wasm_bindgen]
pub struct FormationEngine {
    session: FormationSession,
}

#[wasm_bindgen]
impl FormationEngine {
    /// Create an engine with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> FormationEngine {
        FormationEngine {
            session: FormationSession::new(FormationConfig::default(), seed),
        }
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<FormationEngine, JsValue> {
        let config = api::parse_config(config_json).map_err(to_js_error)?;
        Ok(FormationEngine {
            session: FormationSession::new(config, seed),
        })
    }

    /// Update engine config
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config = api::parse_config(config_json).map_err(to_js_error)?;
        self.session.update_config(config);
        Ok(())
    }

    /// Restart the random sequence
    pub fn reseed(&mut self, seed: u64) {
        self.session.reseed(seed);
    }

    pub fn get_seed(&self) -> u64 {
        self.session.seed()
    }

    /// Next position for one player, from JSON arrays of position names
    pub fn next_position(&mut self, eligible_json: &str, history_json: &str) -> Result<String, JsValue> {
        api::next_position_json(&mut self.session, eligible_json, history_json).map_err(to_js_error)
    }

    /// Form groups from an already resolved roster
    pub fn form_teams(&mut self, policy: &str, players_json: &str, group_count: i32) -> Result<String, JsValue> {
        api::form_teams_json(&mut self.session, policy, players_json, group_count as i64).map_err(to_js_error)
    }

    /// Resolve, balance and return rotation updates for one event
    pub fn run_event(&mut self, payload_json: &str) -> Result<String, JsValue> {
        api::run_event_json(&mut self.session, payload_json).map_err(to_js_error)
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        api::default_config_json()
    }
}
