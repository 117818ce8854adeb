/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::Parser;
use skewer::{Engine, EngineOptions};

fn main() {
    let options = EngineOptions::parse();

    match Engine::new(options) {
        Ok(mut engine) => {
            // Run the engine's main event loop
            if let Err(e) = engine.run() {
                eprintln!("{} encountered a fatal error: {e:#}", engine.name());
            }
        }

        Err(e) => eprintln!("Failed to start engine: {e:#}"),
    }
}
