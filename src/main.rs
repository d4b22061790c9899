mod animation;
mod bounds;
mod chat;
mod config;
mod desktop;
mod error;
mod pet;
mod platform;
mod prefs;
mod runtime;
mod scheduler;
mod sprites;

use bevy::asset::AssetPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowLevel, WindowMode, WindowPosition, WindowResolution};
use bevy::winit::WinitWindows;
use chat::{collect_chat_outcomes, open_chat, ChatBridge, OpenChat};
use config::{LogSettings, PetConfig};
use error::PetError;
use pet::{PetController, WindowCommand};
use platform::{resolve_overlay_bounds, OverlayWindow};
use prefs::PreferenceStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use runtime::{register_tasks, PetRuntime, PetTimers};
use sprites::{AssetImageLoader, Breed};
use std::path::Path;

// Sprites are resolved relative to the working directory.
const ASSET_ROOT: &str = ".";

const BREED_KEYS: [KeyCode; 6] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
];

#[derive(Component)]
struct Pet;

/// A breed picked with the middle button or a digit key.
#[derive(Event, Clone, Copy, Debug)]
struct ChooseBreed(Breed);

fn main() {
    let log = LogSettings::from_env();

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(LogPlugin {
                level: log.level,
                filter: log.filter,
                ..default()
            })
            .set(AssetPlugin {
                file_path: ASSET_ROOT.into(),
                ..default()
            })
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "desktop-cat".into(),
                    name: Some("desktop-cat".into()),
                    // overwritten from the config at startup
                    resolution: WindowResolution::new(128., 128.)
                        .with_scale_factor_override(1.0),
                    resizable: false,
                    decorations: false,
                    transparent: true,
                    window_level: WindowLevel::AlwaysOnBottom,
                    mode: WindowMode::Windowed,
                    ..default()
                }),
                ..default()
            }),
    );

    // After the plugins so config and prefs problems reach the log.
    let config = PetConfig::load();
    let store = PreferenceStore::in_config_dir();
    let breed = store.load().breed;
    debug!("Preferences at {}", store.path().display());

    let mut timers = PetTimers::new(config.tick());
    register_tasks(&mut timers, &config);
    timers.start();
    info!(
        "Starting {breed} cat, {}px sprite, ticking every {:?}",
        config.sprite_size,
        timers.tick_interval()
    );

    app.insert_resource(ClearColor(Color::srgba(0.0, 0.0, 0.0, 0.0)))
        .insert_resource(Time::<Fixed>::from_duration(timers.tick_interval()))
        .insert_resource(ChatBridge::new(config.chat_command.clone()))
        .insert_resource(PetRuntime::new(PetController::new(
            config,
            breed,
            StdRng::from_entropy(),
        )))
        .insert_resource(timers)
        .insert_resource(store)
        .add_event::<OpenChat>()
        .add_event::<ChooseBreed>()
        .add_systems(Startup, (setup_camera, spawn_pet))
        .add_systems(FixedUpdate, run_timers)
        .add_systems(
            Update,
            (
                (
                    handle_pointer,
                    handle_keys,
                    apply_breed_change,
                    apply_window_commands,
                )
                    .chain(),
                (open_chat, collect_chat_outcomes).chain(),
            ),
        )
        .add_systems(Last, stop_timers_on_exit);

    app.run();
}

/// Camera so sprites can be drawn
fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2dBundle::default());
}

/// Loads the breed's sprites, sizes the window and spawns the sprite.
fn spawn_pet(
    mut commands: Commands,
    mut rt: ResMut<PetRuntime>,
    asset_server: Res<AssetServer>,
    mut images: ResMut<Assets<Image>>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
) {
    let mut loader = AssetImageLoader {
        root: Path::new(ASSET_ROOT),
        server: &asset_server,
        images: &mut images,
    };
    rt.controller.load_sprites(&mut loader);

    let size = rt.controller.config().sprite_size as f32;
    if let Ok(mut win) = windows.get_single_mut() {
        win.resolution.set(size, size);
        win.position = WindowPosition::At(rt.controller.position());
    }

    commands.spawn((
        SpriteBundle {
            texture: rt.controller.displayed().cloned().unwrap_or_default(),
            sprite: Sprite {
                custom_size: Some(Vec2::splat(size)),
                ..default()
            },
            ..default()
        },
        Pet,
    ));
}

/// Drives every timed task from the fixed timestep, against the monotonic
/// real clock.
fn run_timers(time: Res<Time<Real>>, mut rt: ResMut<PetRuntime>, mut timers: ResMut<PetTimers>) {
    timers.tick(time.elapsed(), &mut rt);
}

fn handle_pointer(
    buttons: Res<ButtonInput<MouseButton>>,
    mut cursor: EventReader<CursorMoved>,
    windows: Query<Entity, With<PrimaryWindow>>,
    winit_windows: NonSend<WinitWindows>,
    time: Res<Time<Real>>,
    mut rt: ResMut<PetRuntime>,
    mut timers: ResMut<PetTimers>,
    mut chat: EventWriter<OpenChat>,
    mut breeds: EventWriter<ChooseBreed>,
) {
    let now = time.elapsed();

    if buttons.just_pressed(MouseButton::Left) {
        runtime::left_click(&mut rt, &mut timers, now);
        runtime::set_held(&mut timers, true);
    }
    if buttons.just_released(MouseButton::Left) {
        runtime::set_held(&mut timers, false);
    }
    if buttons.pressed(MouseButton::Left) {
        // Cursor is window-relative; it is measured from where the window
        // actually is, which may trail the last requested move.
        if let Some(moved) = cursor.read().last() {
            let origin = windows
                .get_single()
                .ok()
                .and_then(|entity| winit_windows.get_window(entity))
                .and_then(|w| w.outer_position().ok())
                .map(|p| IVec2::new(p.x, p.y));
            let pointer = runtime::drag_pointer(origin, rt.controller.position(), moved.position);
            rt.controller.on_drag(pointer, now);
        }
    } else {
        cursor.clear();
    }

    if buttons.just_pressed(MouseButton::Right) {
        chat.send(OpenChat);
    }
    if buttons.just_pressed(MouseButton::Middle) {
        breeds.send(ChooseBreed(rt.controller.breed().next()));
    }
}

fn handle_keys(
    keys: Res<ButtonInput<KeyCode>>,
    mut breeds: EventWriter<ChooseBreed>,
    mut exit: EventWriter<AppExit>,
) {
    if keys.just_pressed(KeyCode::Escape) {
        info!("Escape pressed, quitting");
        exit.send(AppExit::Success);
    }
    for (key, breed) in BREED_KEYS.iter().zip(Breed::ALL) {
        if keys.just_pressed(*key) {
            breeds.send(ChooseBreed(breed));
        }
    }
}

/// Applies the last breed picked this frame and remembers it.
fn apply_breed_change(
    mut requests: EventReader<ChooseBreed>,
    mut rt: ResMut<PetRuntime>,
    store: Res<PreferenceStore>,
    asset_server: Res<AssetServer>,
    mut images: ResMut<Assets<Image>>,
) {
    let Some(&ChooseBreed(breed)) = requests.read().last() else {
        return;
    };
    let mut loader = AssetImageLoader {
        root: Path::new(ASSET_ROOT),
        server: &asset_server,
        images: &mut images,
    };
    runtime::choose_breed(&mut rt.controller, &store, breed, &mut loader);
}

/// The only place the overlay window is touched: moves, image swaps,
/// work-area queries and stacking order.
fn apply_window_commands(
    mut rt: ResMut<PetRuntime>,
    mut windows: Query<(Entity, &mut Window), With<PrimaryWindow>>,
    winit_windows: NonSend<WinitWindows>,
    mut pets: Query<&mut Handle<Image>, With<Pet>>,
) {
    let rt = &mut *rt;
    let Ok((entity, mut window)) = windows.get_single_mut() else {
        let dropped = rt.controller.take_commands().len() + rt.desktop.take_commands().len();
        if dropped > 0 {
            debug!("{}; dropped {dropped} command(s)", PetError::WindowGone);
        }
        return;
    };
    let raw = winit_windows.get_window(entity);

    for command in rt.controller.take_commands() {
        match command {
            WindowCommand::MoveTo(pos) => window.position = WindowPosition::At(pos),
            WindowCommand::ShowImage(image) => {
                for mut texture in &mut pets {
                    *texture = image.clone();
                }
            }
            WindowCommand::RefreshBounds => {
                let monitors = raw
                    .map(|w| {
                        w.available_monitors()
                            .map(|m| {
                                let (pos, size) = (m.position(), m.size());
                                (IVec2::new(pos.x, pos.y), UVec2::new(size.width, size.height))
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                rt.controller.set_bounds(resolve_overlay_bounds(monitors));
            }
        }
    }

    let mut overlay = OverlayWindow {
        window: &mut window,
        #[cfg(windows)]
        hwnd: raw.and_then(|w| platform::hwnd_of(&**w)),
    };
    rt.desktop.execute(&mut overlay);
}

fn stop_timers_on_exit(mut exits: EventReader<AppExit>, mut timers: ResMut<PetTimers>) {
    if exits.read().next().is_some() && timers.is_running() {
        info!("Stopping timers");
        timers.stop();
    }
}
