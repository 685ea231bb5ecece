/*!
 * Console Reporting
 */

use battmon_core::DeviceState;

pub fn format_state(state: &DeviceState) -> String {
    match (state.connected, state.battery_level) {
        (true, Some(level)) => format!("[✔] {} - {}%", state.name, level),
        (true, None) => format!("[✔] {} - battery unknown", state.name),
        (false, _) => format!("[✘] {}", state.name),
    }
}

pub fn print_states(states: &[DeviceState]) {
    for state in states {
        println!("{}", format_state(state));
    }
}
