use std::process;

use bevy::prelude::*;

use cafe_routines::{world::time::ClockSettings, CorePlugin, NpcPlugin, WorldPlugin};

fn main() {
    let mut app = App::new();
    // Logging is installed while DefaultPlugins builds; config loading reports through it.
    app.add_plugins(DefaultPlugins);

    // Bad clock configuration stops the game before the first frame.
    let settings = match ClockSettings::load() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Invalid clock configuration: {}", err);
            process::exit(1);
        }
    };

    app.add_plugins((
        CorePlugin::default(),
        WorldPlugin::new(settings),
        NpcPlugin::default(),
    ))
    .run();
}
