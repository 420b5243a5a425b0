// SPDX-License-Identifier: MIT

//! Route → K-frame-delay lookup: a scalar default plus explicit per-route
//! overrides, resettable to the values the adapter booted with.

use crate::config::RouteDelay;
use std::collections::HashMap;

type Route = (u8, u8);

#[derive(Debug)]
pub struct ItmDelay {
    default: u32,
    routes: HashMap<Route, u32>,
    boot_default: u32,
    boot_routes: HashMap<Route, u32>,
}

impl ItmDelay {
    pub fn new(default: u32, overrides: &[RouteDelay]) -> ItmDelay {
        // Route keys are (source, destination); uplink traffic flows from
        // the sim-side node toward the sv-side node.
        let routes: HashMap<Route, u32> = overrides
            .iter()
            .map(|r| ((r.sim_node, r.sv_node), r.delay))
            .collect();
        ItmDelay {
            default,
            boot_default: default,
            boot_routes: routes.clone(),
            routes,
        }
    }

    pub fn reset_to_defaults(&mut self) {
        self.default = self.boot_default;
        self.routes = self.boot_routes.clone();
    }

    /// Applies to every route without an explicit override.
    pub fn set_default(&mut self, frames: u32) {
        self.default = frames;
    }

    pub fn set_route(&mut self, src: u8, dst: u8, frames: u32) {
        self.routes.insert((src, dst), frames);
    }

    pub fn lookup(&self, src: u8, dst: u8) -> u32 {
        self.routes.get(&(src, dst)).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_default() {
        let mut delays = ItmDelay::new(2, &[]);
        assert_eq!(delays.lookup(1, 2), 2);
        delays.set_route(1, 2, 7);
        assert_eq!(delays.lookup(1, 2), 7);
        assert_eq!(delays.lookup(2, 1), 2, "reverse route keeps the default");
    }

    #[test]
    fn set_default_spares_overrides() {
        let mut delays = ItmDelay::new(0, &[]);
        delays.set_route(3, 4, 9);
        delays.set_default(5);
        assert_eq!(delays.lookup(3, 4), 9);
        assert_eq!(delays.lookup(4, 3), 5);
    }

    #[test]
    fn reset_restores_boot_values() {
        let boot = [RouteDelay {
            sv_node: 2,
            sim_node: 1,
            delay: 3,
        }];
        let mut delays = ItmDelay::new(1, &boot);
        delays.set_default(9);
        delays.set_route(1, 2, 9);
        delays.set_route(5, 5, 9);
        delays.reset_to_defaults();
        assert_eq!(delays.lookup(1, 2), 3);
        assert_eq!(delays.lookup(5, 5), 1);
    }
}
