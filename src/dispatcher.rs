//! Entity cache and listener dispatch for pushed `DATA` frames.
//!
//! Owns the four entity caches and the per-entity-class listener
//! registries. [`Dispatcher::handle_data_frame`] is the only way caches are
//! mutated — callers only ever observe them through the read-only
//! accessors or a registered listener.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, info, warn};

use crate::constants::tlv_type;
use crate::entities::{Area, Door, Input, Output};
use crate::listener::{ListenerHandle, Registry};
use crate::tlv;

/// Entity cache and listener registry for one `Session`.
pub struct Dispatcher {
    doors: Mutex<HashMap<u32, Door>>,
    inputs: Mutex<HashMap<u32, Input>>,
    outputs: Mutex<HashMap<u32, Output>>,
    areas: Mutex<HashMap<u32, Area>>,

    door_listeners: Registry<Door>,
    input_listeners: Registry<Input>,
    output_listeners: Registry<Output>,
    area_listeners: Registry<Area>,
    event_listeners: Registry<String>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            doors: Mutex::new(HashMap::new()),
            inputs: Mutex::new(HashMap::new()),
            outputs: Mutex::new(HashMap::new()),
            areas: Mutex::new(HashMap::new()),
            door_listeners: Registry::new("door"),
            input_listeners: Registry::new("input"),
            output_listeners: Registry::new("output"),
            area_listeners: Registry::new("area"),
            event_listeners: Registry::new("event"),
        }
    }

    /// Decode and apply every TLV record in a `DATA` frame's payload.
    ///
    /// A truncated record aborts parsing of the remaining records in this
    /// frame but is otherwise non-fatal: the records already applied stay
    /// applied, and the caller still owes the panel exactly one ACK.
    pub fn handle_data_frame(&self, payload: &[u8]) {
        let records = match tlv::decode(payload) {
            Ok(records) => records,
            Err(e) => {
                warn!("truncated DATA payload, dropping remainder: {e}");
                return;
            }
        };

        for record in records {
            match record.record_type {
                tlv_type::DOOR_STATUS => self.apply_door_status(&record.value),
                tlv_type::INPUT_STATUS => self.apply_input_status(&record.value),
                tlv_type::OUTPUT_STATUS => self.apply_output_status(&record.value),
                tlv_type::AREA_STATUS => self.apply_area_status(&record.value),
                tlv_type::EVENT_READABLE => self.apply_event(&record.value),
                other => debug!("skipping unrecognized TLV type 0x{other:04X}"),
            }
        }
    }

    fn apply_door_status(&self, value: &[u8]) {
        if value.len() < 6 {
            warn!("door status record too short ({} bytes)", value.len());
            return;
        }
        let index = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let door = Door::from_status_bytes(index, value[4], value[5]);
        self.doors.lock().expect("door cache lock poisoned").insert(index, door);
        self.door_listeners.dispatch(door);
    }

    fn apply_input_status(&self, value: &[u8]) {
        if value.len() < 14 {
            warn!("input status record too short ({} bytes)", value.len());
            return;
        }
        let index = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let mut reference = [0u8; 8];
        reference.copy_from_slice(&value[4..12]);
        let input = Input::from_status_bytes(index, reference, value[12], value[13]);
        self.inputs
            .lock()
            .expect("input cache lock poisoned")
            .insert(index, input.clone());
        self.input_listeners.dispatch(input);
    }

    fn apply_output_status(&self, value: &[u8]) {
        if value.len() < 13 {
            warn!("output status record too short ({} bytes)", value.len());
            return;
        }
        let index = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let mut reference = [0u8; 8];
        reference.copy_from_slice(&value[4..12]);
        let output = Output::from_status_bytes(index, reference, value[12]);
        self.outputs
            .lock()
            .expect("output cache lock poisoned")
            .insert(index, output.clone());
        self.output_listeners.dispatch(output);
    }

    fn apply_area_status(&self, value: &[u8]) {
        if value.len() < 7 {
            warn!("area status record too short ({} bytes)", value.len());
            return;
        }
        let index = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
        let area = Area::from_status_bytes(index, value[4], value[5], value[6]);
        self.areas.lock().expect("area cache lock poisoned").insert(index, area);
        self.area_listeners.dispatch(area);
    }

    fn apply_event(&self, value: &[u8]) {
        let text = value.strip_suffix(&[0]).unwrap_or(value);
        let text = String::from_utf8_lossy(text).into_owned();
        info!("event: {text}");
        self.event_listeners.dispatch(text);
    }

    pub fn door(&self, index: u32) -> Option<Door> {
        self.doors.lock().expect("door cache lock poisoned").get(&index).copied()
    }

    pub fn input(&self, index: u32) -> Option<Input> {
        self.inputs.lock().expect("input cache lock poisoned").get(&index).cloned()
    }

    pub fn output(&self, index: u32) -> Option<Output> {
        self.outputs.lock().expect("output cache lock poisoned").get(&index).cloned()
    }

    pub fn area(&self, index: u32) -> Option<Area> {
        self.areas.lock().expect("area cache lock poisoned").get(&index).copied()
    }

    pub fn doors(&self) -> Vec<Door> {
        self.doors.lock().expect("door cache lock poisoned").values().copied().collect()
    }

    pub fn inputs(&self) -> Vec<Input> {
        self.inputs.lock().expect("input cache lock poisoned").values().cloned().collect()
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.outputs.lock().expect("output cache lock poisoned").values().cloned().collect()
    }

    pub fn areas(&self) -> Vec<Area> {
        self.areas.lock().expect("area cache lock poisoned").values().copied().collect()
    }

    pub fn on_door<F: FnMut(Door) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.door_listeners.register(callback)
    }

    pub fn on_input<F: FnMut(Input) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.input_listeners.register(callback)
    }

    pub fn on_output<F: FnMut(Output) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.output_listeners.register(callback)
    }

    pub fn on_area<F: FnMut(Area) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.area_listeners.register(callback)
    }

    pub fn on_event<F: FnMut(String) + Send + 'static>(&self, callback: F) -> ListenerHandle {
        self.event_listeners.register(callback)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("doors", &self.doors.lock().map(|d| d.len()).unwrap_or(0))
            .field("inputs", &self.inputs.lock().map(|d| d.len()).unwrap_or(0))
            .field("outputs", &self.outputs.lock().map(|d| d.len()).unwrap_or(0))
            .field("areas", &self.areas.lock().map(|d| d.len()).unwrap_or(0))
            .finish()
    }
}
