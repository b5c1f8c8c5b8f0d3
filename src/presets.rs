/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashMap;

/// A fixed single parameter feed selected by name and station id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub query: &'static str,
    pub parameter: &'static str,
    pub is_forecast: bool,
    pub icon: &'static str,
    pub unit: &'static str,
}

lazy_static! {
    static ref PRESETS: HashMap<&'static str, Preset> = {
        let mut m = HashMap::new();
        m.insert(
            "Waterlevel",
            Preset {
                name: "Waterlevel",
                query: "fmi::observations::mareograph::instant::simple",
                parameter: "WLEVN2K_PT1S_INSTANT",
                is_forecast: false,
                icon: "mdi:waves-arrow-up",
                unit: "mm",
            },
        );
        m.insert(
            "Waterlevel forecast",
            Preset {
                name: "Waterlevel forecast",
                query: "fmi::forecast::sealevel::point::simple",
                parameter: "SeaLevelN2000",
                is_forecast: true,
                icon: "mdi:waves-arrow-up",
                unit: "cm",
            },
        );
        m.insert(
            "UVI",
            Preset {
                name: "UVI",
                query: "fmi::observations::radiation::simple",
                parameter: "UVB_U",
                is_forecast: false,
                icon: "mdi:sun-wireless",
                unit: "UVI",
            },
        );
        m
    };
}

pub fn get_preset(name: &str) -> Option<Preset> {
    PRESETS.get(name).copied()
}

pub fn preset_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PRESETS.keys().copied().collect();
    names.sort_unstable();
    names
}
