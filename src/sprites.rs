//! Sprite sets per breed: still images per mood plus the walk cycle.

use crate::error::PetError;
use crate::pet::Mood;
use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const MAX_WALK_FRAMES: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breed {
    #[default]
    Orange,
    Tabby,
    Siamese,
    Tuxedo,
    Tortie,
    Calico,
}

impl Breed {
    pub const ALL: [Breed; 6] = [
        Breed::Orange,
        Breed::Tabby,
        Breed::Siamese,
        Breed::Tuxedo,
        Breed::Tortie,
        Breed::Calico,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Breed::Orange => "orange",
            Breed::Tabby => "tabby",
            Breed::Siamese => "siamese",
            Breed::Tuxedo => "tuxedo",
            Breed::Tortie => "tortie",
            Breed::Calico => "calico",
        }
    }

    pub fn next(self) -> Breed {
        let i = Self::ALL.iter().position(|&b| b == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Breed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where images come from. The app backs this with the asset server; tests
/// use an in-memory fake.
pub trait ImageLoader {
    /// Loads the image at `path`, or reports it missing.
    fn load(&mut self, path: &Path) -> Result<Handle<Image>, PetError>;
    /// Registers an image built in memory.
    fn insert(&mut self, image: Image) -> Handle<Image>;
}

/// Displayable images for one breed. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct SpriteSet {
    idle: Handle<Image>,
    happy: Handle<Image>,
    sleep: Handle<Image>,
    walk: Vec<Handle<Image>>,
}

impl SpriteSet {
    pub fn new(
        idle: Handle<Image>,
        happy: Handle<Image>,
        sleep: Handle<Image>,
        walk: Vec<Handle<Image>>,
    ) -> Self {
        Self {
            idle,
            happy,
            sleep,
            walk,
        }
    }

    pub fn still(&self, mood: Mood) -> &Handle<Image> {
        match mood {
            Mood::Idle => &self.idle,
            Mood::Happy => &self.happy,
            Mood::Sleep => &self.sleep,
        }
    }

    pub fn walk_frame(&self, index: usize) -> Option<&Handle<Image>> {
        self.walk.get(index)
    }

    pub fn walk_frame_count(&self) -> usize {
        self.walk.len()
    }

    /// Resolves every image of `breed`. HD art lives under `dir`, per-mood
    /// art under `mood_dir`. Each mood tries its candidate paths in order;
    /// moods with no file share one drawn image.
    pub fn load(
        breed: Breed,
        dir: &Path,
        mood_dir: &Path,
        size: u32,
        loader: &mut dyn ImageLoader,
    ) -> SpriteSet {
        let mut fallback: Option<Handle<Image>> = None;
        let mut still = |mood: Mood, loader: &mut dyn ImageLoader| -> Handle<Image> {
            let found = still_candidates(dir, mood_dir, breed, mood)
                .iter()
                .find_map(|path| match loader.load(path) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        debug!("{err}");
                        None
                    }
                });
            found.unwrap_or_else(|| {
                fallback
                    .get_or_insert_with(|| {
                        warn!("No {mood} sprite for {breed}; drawing a fallback");
                        loader.insert(fallback_image(size))
                    })
                    .clone()
            })
        };
        let idle = still(Mood::Idle, loader);
        let happy = still(Mood::Happy, loader);
        let sleep = still(Mood::Sleep, loader);

        let walk: Vec<Handle<Image>> = (0..MAX_WALK_FRAMES)
            .map_while(|i| loader.load(&walk_frame_path(dir, breed, i)).ok())
            .collect();

        info!("Loaded {breed} sprites ({} walk frames)", walk.len());
        SpriteSet::new(idle, happy, sleep, walk)
    }
}

pub fn still_candidates(dir: &Path, mood_dir: &Path, breed: Breed, mood: Mood) -> [PathBuf; 4] {
    [
        dir.join(format!("{breed}_{mood}.png")),
        mood_dir.join(breed.as_str()).join(format!("cat_{mood}.png")),
        dir.join(format!("{breed}_sit.png")),
        mood_dir.join(format!("cat_{mood}.png")),
    ]
}

pub fn walk_frame_path(dir: &Path, breed: Breed, index: usize) -> PathBuf {
    dir.join(format!("{breed}_walk_{index}.png"))
}

/// Owns the sprite sets of loaded breeds. Evicting a breed drops its strong
/// handles, which lets the asset server free the images.
#[derive(Default)]
pub struct SpriteCache {
    sets: HashMap<Breed, SpriteSet>,
}

impl SpriteCache {
    pub fn get(&self, breed: Breed) -> Option<&SpriteSet> {
        self.sets.get(&breed)
    }

    pub fn contains(&self, breed: Breed) -> bool {
        self.sets.contains_key(&breed)
    }

    pub fn load(
        &mut self,
        breed: Breed,
        dir: &Path,
        mood_dir: &Path,
        size: u32,
        loader: &mut dyn ImageLoader,
    ) -> &SpriteSet {
        self.sets
            .entry(breed)
            .or_insert_with(|| SpriteSet::load(breed, dir, mood_dir, size, loader))
    }

    pub fn evict(&mut self, breed: Breed) -> Option<SpriteSet> {
        let evicted = self.sets.remove(&breed);
        if evicted.is_some() {
            debug!("Released {breed} sprites");
        }
        evicted
    }
}

const FALLBACK_BODY: [u8; 4] = [255, 105, 180, 255];
const FALLBACK_EYE: [u8; 4] = [0, 0, 0, 255];
const FALLBACK_NOSE: [u8; 4] = [255, 192, 203, 255];

/// RGBA pixels of the stand-in cat: a filled circle body, two eyes and a
/// nose on a transparent background. Drawn on a 64 px grid and scaled.
pub fn fallback_pixels(size: u32) -> Vec<u8> {
    let size = size.max(1);
    let scale = size as f32 / 64.0;
    // (center x, center y, radius, colour), later entries paint over earlier ones.
    let discs = [
        (32.0, 32.0, 22.0, FALLBACK_BODY),
        (25.0, 25.0, 5.0, FALLBACK_EYE),
        (39.0, 25.0, 5.0, FALLBACK_EYE),
        (32.0, 37.0, 2.0, FALLBACK_NOSE),
    ];

    let mut data = vec![0u8; (size * size * 4) as usize];
    for y in 0..size {
        for x in 0..size {
            let px = (x as f32 + 0.5) / scale;
            let py = (y as f32 + 0.5) / scale;
            let colour = discs
                .iter()
                .filter(|(cx, cy, r, _)| (px - cx).powi(2) + (py - cy).powi(2) <= r * r)
                .last()
                .map(|(_, _, _, c)| *c);
            if let Some(c) = colour {
                let i = ((y * size + x) * 4) as usize;
                data[i..i + 4].copy_from_slice(&c);
            }
        }
    }
    data
}

pub fn fallback_image(size: u32) -> Image {
    let size = size.max(1);
    Image::new(
        Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        fallback_pixels(size),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    )
}

/// Loads from files under `root` through the asset server. Files are checked
/// on disk first so a missing sprite is known up front instead of surfacing
/// later as an asset load failure.
pub struct AssetImageLoader<'a> {
    pub root: &'a Path,
    pub server: &'a AssetServer,
    pub images: &'a mut Assets<Image>,
}

impl ImageLoader for AssetImageLoader<'_> {
    fn load(&mut self, path: &Path) -> Result<Handle<Image>, PetError> {
        if !self.root.join(path).is_file() {
            return Err(PetError::AssetMissing(path.to_path_buf()));
        }
        Ok(self.server.load(path.to_path_buf()))
    }

    fn insert(&mut self, image: Image) -> Handle<Image> {
        self.images.add(image)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Serves handles for a fixed set of paths and counts drawn images.
    #[derive(Default)]
    pub(crate) struct FakeLoader {
        pub present: HashSet<PathBuf>,
        pub loaded: Vec<PathBuf>,
        pub inserted: u32,
        next_id: u128,
    }

    impl FakeLoader {
        pub(crate) fn with_files<I: IntoIterator<Item = PathBuf>>(files: I) -> Self {
            Self {
                present: files.into_iter().collect(),
                ..Default::default()
            }
        }

        pub(crate) fn full_breed(dir: &Path, breed: Breed, walk_frames: usize) -> Self {
            let mut files: Vec<PathBuf> = [Mood::Idle, Mood::Happy, Mood::Sleep]
                .iter()
                .map(|&m| dir.join(format!("{breed}_{m}.png")))
                .collect();
            files.extend((0..walk_frames).map(|i| walk_frame_path(dir, breed, i)));
            Self::with_files(files)
        }

        fn handle(&mut self) -> Handle<Image> {
            self.next_id += 1;
            Handle::weak_from_u128(self.next_id)
        }
    }

    impl ImageLoader for FakeLoader {
        fn load(&mut self, path: &Path) -> Result<Handle<Image>, PetError> {
            if !self.present.contains(path) {
                return Err(PetError::AssetMissing(path.to_path_buf()));
            }
            self.loaded.push(path.to_path_buf());
            Ok(self.handle())
        }

        fn insert(&mut self, _image: Image) -> Handle<Image> {
            self.inserted += 1;
            self.handle()
        }
    }

    const MOOD_DIR: &str = "sprites";

    #[test]
    fn breed_cycle_visits_every_breed() {
        let mut breed = Breed::default();
        let mut seen = vec![breed];
        for _ in 1..Breed::ALL.len() {
            breed = breed.next();
            seen.push(breed);
        }
        assert_eq!(seen, Breed::ALL.to_vec());
        assert_eq!(breed.next(), Breed::Orange);
    }

    #[test]
    fn breed_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Breed::Tuxedo).unwrap(), "\"tuxedo\"");
        let b: Breed = serde_json::from_str("\"calico\"").unwrap();
        assert_eq!(b, Breed::Calico);
    }

    #[test]
    fn full_set_uses_mood_files_and_walk_frames() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::full_breed(dir, Breed::Tabby, 6);
        let set = SpriteSet::load(Breed::Tabby, dir, Path::new(MOOD_DIR), 128, &mut loader);
        assert_eq!(set.walk_frame_count(), 6);
        assert_ne!(set.still(Mood::Idle), set.still(Mood::Sleep));
        assert_eq!(loader.inserted, 0);
    }

    #[test]
    fn sit_image_stands_in_for_missing_moods() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::with_files([dir.join("orange_sit.png")]);
        let set = SpriteSet::load(Breed::Orange, dir, Path::new(MOOD_DIR), 128, &mut loader);
        assert_eq!(loader.loaded.len(), 3);
        assert!(loader.loaded.iter().all(|p| p.ends_with("orange_sit.png")));
        assert_eq!(set.walk_frame_count(), 0);
        assert_eq!(loader.inserted, 0);
    }

    #[test]
    fn per_breed_mood_art_is_found_outside_hd_dir() {
        let dir = Path::new("sprites_hd");
        let mood_dir = Path::new(MOOD_DIR);
        let mut loader = FakeLoader::with_files([Mood::Idle, Mood::Happy, Mood::Sleep].map(|m| {
            mood_dir.join("tuxedo").join(format!("cat_{m}.png"))
        }));
        let set = SpriteSet::load(Breed::Tuxedo, dir, mood_dir, 128, &mut loader);
        assert_eq!(loader.inserted, 0);
        assert_ne!(set.still(Mood::Idle), set.still(Mood::Happy));
        assert_ne!(set.still(Mood::Happy), set.still(Mood::Sleep));
        assert_ne!(set.still(Mood::Idle), set.still(Mood::Sleep));
    }

    #[test]
    fn shared_mood_art_is_the_last_resort() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::with_files([
            Path::new(MOOD_DIR).join("cat_idle.png"),
            Path::new(MOOD_DIR).join("cat_sleep.png"),
        ]);
        let set = SpriteSet::load(Breed::Orange, dir, Path::new(MOOD_DIR), 128, &mut loader);
        // Happy has no file anywhere and gets the drawn cat.
        assert_eq!(loader.inserted, 1);
        assert_ne!(set.still(Mood::Idle), set.still(Mood::Sleep));
        assert_ne!(set.still(Mood::Happy), set.still(Mood::Idle));
    }

    #[test]
    fn no_files_share_one_fallback_image() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::default();
        let set = SpriteSet::load(Breed::Siamese, dir, Path::new(MOOD_DIR), 64, &mut loader);
        assert_eq!(loader.inserted, 1);
        assert_eq!(set.still(Mood::Idle), set.still(Mood::Happy));
        assert_eq!(set.still(Mood::Idle), set.still(Mood::Sleep));
    }

    #[test]
    fn walk_frames_stop_at_first_gap() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::with_files([
            walk_frame_path(dir, Breed::Calico, 0),
            walk_frame_path(dir, Breed::Calico, 1),
            walk_frame_path(dir, Breed::Calico, 3),
        ]);
        let set = SpriteSet::load(Breed::Calico, dir, Path::new(MOOD_DIR), 64, &mut loader);
        assert_eq!(set.walk_frame_count(), 2);
    }

    #[test]
    fn cache_evicts_and_reloads() {
        let dir = Path::new("sprites_hd");
        let mut loader = FakeLoader::full_breed(dir, Breed::Orange, 2);
        let mut cache = SpriteCache::default();
        cache.load(Breed::Orange, dir, Path::new(MOOD_DIR), 64, &mut loader);
        cache.load(Breed::Orange, dir, Path::new(MOOD_DIR), 64, &mut loader);
        // Second load is served from the cache.
        assert_eq!(loader.loaded.len(), 5);

        assert!(cache.evict(Breed::Orange).is_some());
        assert!(!cache.contains(Breed::Orange));
        assert!(cache.evict(Breed::Orange).is_none());
    }

    #[test]
    fn fallback_has_body_eyes_and_transparent_corners() {
        let size = 64;
        let data = fallback_pixels(size);
        let at = |x: u32, y: u32| {
            let i = ((y * size + x) * 4) as usize;
            [data[i], data[i + 1], data[i + 2], data[i + 3]]
        };
        assert_eq!(at(0, 0)[3], 0);
        assert_eq!(at(32, 48), FALLBACK_BODY);
        assert_eq!(at(25, 25), FALLBACK_EYE);
        assert_eq!(at(39, 25), FALLBACK_EYE);
        assert_eq!(at(32, 37), FALLBACK_NOSE);
    }

    #[test]
    fn fallback_scales_with_size() {
        let data = fallback_pixels(128);
        assert_eq!(data.len(), 128 * 128 * 4);
        let i = ((64 * 128 + 64) * 4) as usize;
        assert_eq!(data[i + 3], 255);
    }
}
