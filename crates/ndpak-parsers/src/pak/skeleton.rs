// ndpak-parsers/src/pak/skeleton.rs
//! Base-skeleton lookup for skinned containers without joints of their own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndpak_core::Game;
use parking_lot::RwLock;

use super::PakContainer;
use crate::config::PakOptions;
use crate::traits::{ParseError, ParseResult};

/// What the skeleton is needed for; selects the sibling-file guess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonPurpose {
    /// Decoding: try `<name>.skel.pak`
    Load,
    /// Injection: try `<name>-base.pak`
    Write,
}

const U4_HINTS: &[(&str, &str)] = &[
    ("adventurer", "actor77/adventurer-base.pak"),
    ("alcazar", "actor77/alcazar-base.pak"),
    ("auctioneer", "actor77/auctioneer-f-base.pak"),
    ("avery", "actor77/avery-base.pak"),
    ("avery-guard", "actor77/avery-guard-base.pak"),
    ("bucket", "actor77/sco-bucket-base.pak"),
    ("cassie", "actor77/cassie-base.pak"),
    ("crash", "actor77/crash-base.pak"),
    ("elena", "actor77/elena-base.pak"),
    ("fem", "actor77/npc-normal-fem-base.pak"),
    ("-gun", "actor77/pistol-base.pak"),
    ("gustavo", "actor77/gustavo-base.pak"),
    ("hero", "actor77/proto.pak"),
    ("prison-drake", "actor77/prison-drake-base.pak"),
    ("jameson", "actor77/jameson-base.pak"),
    ("lemur", "actor77/lemur-base.pak"),
    ("manager", "actor77/manager-base.pak"),
    ("medium", "actor77/npc-medium-base.pak"),
    ("monica", "actor77/monica-base.pak"),
    ("nadine", "actor77/nadine-base.pak"),
    ("pistol", "actor77/pistol-base.pak"),
    ("rafe", "actor77/rafe-base.pak"),
    ("rifle", "actor77/rifle-base.pak"),
    ("samuel", "actor77/samuel-base.pak"),
    ("smokey", "actor77/smokey-base.pak"),
    ("sull", "actor77/sullivan-base.pak"),
    ("tew", "actor77/tew-base.pak"),
    ("throw", "actor77/throwable-base.pak"),
    ("vargas", "actor77/vargas-base.pak"),
    ("young-drake", "actor77/young-drake-base.pak"),
    ("young-samuel", "actor77/young-samuel-base.pak"),
];

const TLL_HINTS: &[(&str, &str)] = &[
    ("asav", "actor77/asav-base.pak"),
    ("chloe", "actor77/chloe-base.pak"),
    ("elena", "actor77/elena-base.pak"),
    ("hero", "actor77/proto.pak"),
    ("horse", "actor77/horse-base.pak"),
    ("light", "actor77/light-base.pak"),
    ("meenu", "actor77/meenu-base.pak"),
    ("monkey", "actor77/monkey-base.pak"),
    ("nadine", "actor77/nadine-base.pak"),
    ("nadine-dlc", "actor77/nadine-dlc-base.pak"),
    ("nilay", "actor77/nilay-base.pak"),
    ("kid", "actor77/npc-kid-base.pak"),
    ("kid-fem", "actor77/npc-kid-fem-base.pak"),
    ("medium", "actor77/npc-medium-base.pak"),
    ("normal", "actor77/npc-normal-base.pak"),
    ("male-0", "actor77/npc-normal-crowd-base.pak"),
    ("female-0", "actor77/npc-normal-crowd-fem-base.pak"),
    ("fem", "actor77/npc-normal-fem-base.pak"),
    ("orca", "actor77/orca-base.pak"),
    ("pistol", "actor77/pistol-base.pak"),
    ("prison", "actor77/prison-drake-base.pak"),
    ("rifle", "actor77/rifle-base.pak"),
    ("samuel", "actor77/samuel-base.pak"),
    ("samuel-dlc", "actor77/samuel-dlc-base.pak"),
    ("sandy", "actor77/sandy-base.pak"),
    ("smokey", "actor77/smokey-base.pak"),
    ("sull", "actor77/sullivan-base.pak"),
    ("throw", "actor77/throwable-base.pak"),
    ("vin", "actor77/vin-base.pak"),
    ("waz", "actor77/waz-base.pak"),
];

const TLOUP1_HINTS: &[(&str, &str)] = &[
    ("abby", "sp-common/actor97/abby-skel.pak"),
    ("alice", "sp-common/actor97/alice-skel.pak"),
    ("base-female", "sp-common/actor97/base-female-skel.pak"),
    ("base-male", "sp-common/actor97/base-male-skel.pak"),
    ("bill", "sp-common/actor97/t1x-bill-skel.pak"),
    ("bird", "sp-common/actor97/bird-medium-skel.pak"),
    ("bloater", "sp-common/actor97/bloater-skel.pak"),
    ("brute-male", "world-bills/actor97/base-brute-male-skel.pak"),
    ("buck", "sp-common/actor97/buck-skel.pak"),
    ("clicker", "world-mall/actor97/clicker-m-pharmacist-skel.pak"),
    ("david", "sp-common/actor97/t1x-david-skel.pak"),
    ("dina", "sp-common/actor97/dina-skel.pak"),
    ("dog", "sp-common/actor97/dog-skel.pak"),
    ("ellie", "sp-common/actor97/t1x-ellie-skel.pak"),
    ("extinguisher", "sp-common/actor97/fire-extinguisher-skel.pak"),
    ("female-crowd", "world-home/actor97/base-female-crowd-skel.pak"),
    ("female-horde", "world-home/actor97/base-female-horde-skel.pak"),
    ("giraffe", "sp-common/actor97/giraffe-skel.pak"),
    ("hare", "sp-common/actor97/hare-skel.pak"),
    ("henry", "sp-common/actor97/t1x-henry-skel.pak"),
    ("hunter", "sp-common/actor97/t1x-hunter-m-striker-skel.pak"),
    ("horse", "sp-common/actor97/horse-main-skel.pak"),
    ("infect", "sp-common/actor97/infected-skel.pak"),
    ("infected-fem", "world-bills/actor97/infected-fem-skel.pak"),
    ("james", "sp-common/actor97/t1x-james-skel.pak"),
    ("jerry", "sp-common/actor97/jerry-skel.pak"),
    ("joel", "sp-common/actor97/t1x-joel-skel.pak"),
    ("male-crowd", "world-home/actor97/base-male-crowd-skel.pak"),
    ("male-horde", "world-home/actor97/base-male-horde-skel.pak"),
    ("manny", "world-bills/actor97/manny-skel.pak"),
    ("maria", "sp-common/actor97/t1x-maria-skel.pak"),
    ("marlene", "sp-common/actor97/t1x-marlene-skel.pak"),
    ("mask", "world-mall/actor97/t1x-mask-skel.pak"),
    ("monkey", "sp-common/actor97/t1x-monkey-skel.pak"),
    ("npc", "sp-common/actor97/npc-normal-skel.pak"),
    ("reporter", "sp-common/actor97/texan-f-news-reporter-skel.pak"),
    ("riley", "sp-common/actor97/t1x-riley-skel.pak"),
    ("robert", "sp-common/actor97/t1x-robert-skel.pak"),
    ("sam", "sp-common/actor97/t1x-sam-skel.pak"),
    ("sarah", "sp-common/actor97/t1x-sarah-skel.pak"),
    ("seth", "world-suburbs/actor97/seth-skel.pak"),
    ("teen", "world-home/actor97/base-teen-skel.pak"),
    ("tess", "sp-common/actor97/t1x-tess-skel.pak"),
    ("tommy", "sp-common/actor97/t1x-tommy-skel.pak"),
];

const TLOU2_HINTS: &[(&str, &str)] = &[
    ("abby", "world-patrol-jackson/actor97/abby-skel.pak"),
    ("abby-prisoner", "world-medicine/actor97/abby-prisoner-skel.pak"),
    ("alice", "world-patrol-jackson/actor97/alice-skel.pak"),
    ("backpack-ellie-museum", "world-theater/actor97/backpack-ellie-museum-skel.pak"),
    ("backpack-young-ellie", "world-theater/actor97/backpack-young-ellie-skel.pak"),
    ("base-baby", "world-patrol-jackson/actor97/base-baby-skel.pak"),
    ("base-brute-female", "world-find-nora/actor97/base-brute-female-skel.pak"),
    ("base-brute-male", "world-ellie-flashback-patrol/actor97/base-brute-male-skel.pak"),
    ("base-female", "world-flashback-guitar/actor97/base-female-skel.pak"),
    ("base-female-crowd", "world-flashback-guitar/actor97/base-female-crowd-skel.pak"),
    ("base-female-horde", "world-patrol/actor97/base-female-horde-skel.pak"),
    ("base-kid", "world-flashback-guitar/actor97/base-kid-skel.pak"),
    ("base-kid-female", "world-farm/actor97/base-kid-female-skel.pak"),
    ("base-male", "common/actor97/base-male-skel.pak"),
    ("base-male-crowd", "world-flashback-guitar/actor97/base-male-crowd-skel.pak"),
    ("base-male-horde", "world-tracking-horde/actor97/base-male-horde-skel.pak"),
    ("base-teen", "world-flashback-guitar/actor97/base-teen-skel.pak"),
    ("bird-large", "world-saving-kids/actor97/bird-large-skel-t2.pak"),
    ("bird-medium-t2", "world-flashback-guitar/actor97/bird-medium-skel-t2.pak"),
    ("bird-small", "world-theater/actor97/bird-small-skel-t2.pak"),
    ("bird-tiny", "world-forward-base/actor97/bird-tiny-skel.pak"),
    ("bird-xlarge-t2", "world-find-nora/actor97/bird-xlarge-skel-t2.pak"),
    ("bloater", "world-ellie-flashback-patrol/actor97/bloater-skel.pak"),
    ("boar", "world-theater/actor97/boar-skel.pak"),
    ("buck", "world-theater/actor97/buck-skel.pak"),
    ("cab-high", "world-watchtower/actor97/cab-high-skel-r.pak"),
    ("cab-high-l", "world-flooded-city/actor97/cab-high-skel-l.pak"),
    ("cab-short", "world-seattle-arrival/actor97/cab-short-skel-l.pak"),
    ("cab-short-r", "world-patrol/actor97/cab-short-skel-r.pak"),
    ("carry-plank", "world-saving-kids/actor97/carry-plank-skel.pak"),
    ("cat", "world-seattle-arrival/actor97/cat-skel.pak"),
    ("chicken", "world-forward-base/actor97/chicken-skel.pak"),
    ("cow", "world-patrol-jackson/actor97/cow-skel.pak"),
    ("dina", "world-flashback-guitar/actor97/dina-skel.pak"),
    ("doe", "world-flashback-guitar/actor97/doe-skel.pak"),
    ("dog", "world-patrol-jackson/actor97/dog-skel.pak"),
    ("dog-crowd", "world-forward-base/actor97/dog-crowd-skel.pak"),
    ("door", "world-flashback-guitar/actor97/door-skel.pak"),
    ("door-dbl", "world-tracking-horde/actor97/door-dbl-skel.pak"),
    ("drawer", "world-flashback-guitar/actor97/drawer-skel.pak"),
    ("ellie", "common/actor97/ellie-skel.pak"),
    ("ellie-14", "world-flashback-guitar/actor97/ellie-14-skel.pak"),
    ("ellie-festival-strand-hair-cloth", "sp-common/actor97/ellie-festival-strand-hair-cloth-skel.pak"),
    ("ellie-santa-barbara-hair-cloth", "sp-common/actor97/ellie-santa-barbara-hair-cloth-skel.pak"),
    ("ellie-seattle-hoodie-string", "sp-common/actor97/ellie-seattle-hoodie-string-skel.pak"),
    ("festival-partner", "world-farm/actor97/festival-partner-skel.pak"),
    ("fish", "world-seattle-arrival/actor97/fish-skel-lrg.pak"),
    ("fish-sml", "world-forward-base/actor97/fish-skel-sml.pak"),
    ("fish-tiny", "world-theater/actor97/fish-skel-tiny.pak"),
    ("frog", "world-find-nora/actor97/frog-skel.pak"),
    ("guitar", "world-flashback-guitar/actor97/guitar-skel.pak"),
    ("gustavo", "world-patrol-jackson/actor97/gustavo-skel.pak"),
    ("halloween-a-hanging", "world-forward-base/actor97/halloween-skeleton-a-hanging.pak"),
    ("hangmans-noose-2m", "world-watchtower/actor97/hangmans-noose-2m-body-skel.pak"),
    ("horse", "world-flashback-guitar/actor97/horse-skel.pak"),
    ("horse-crowd", "world-forward-base/actor97/horse-crowd-skel.pak"),
    ("horse-main", "world-flashback-guitar/actor97/horse-main-skel.pak"),
    ("horse-main-rein-cloth", "sp-common/actor97/horse-main-rein-cloth-skel.pak"),
    ("horse-main-stirrups", "sp-common/actor97/horse-main-stirrups-skel.pak"),
    ("horse-mane-cloth", "sp-common/actor97/horse-mane-cloth-skel.pak"),
    ("horse-saddle-bag-straps-cloth", "sp-common/actor97/horse-saddle-bag-straps-cloth-skel.pak"),
    ("horse-saddle-strap-cloth", "sp-common/actor97/horse-saddle-strap-cloth-skel.pak"),
    ("horse-tail-cloth", "sp-common/actor97/horse-tail-cloth-skel.pak"),
    ("infected-bloater", "world-ellie-flashback-patrol/actor97/infected-bloater-skel.pak"),
    ("infected-skel", "world-tracking/actor97/infected-skel.pak"),
    ("isaac", "world-forward-base/actor97/isaac-skel.pak"),
    ("jerry", "world-flashback-guitar/actor97/jerry-skel.pak"),
    ("jesse", "world-flashback-guitar/actor97/jesse-skel.pak"),
    ("joel", "world-flashback-guitar/actor97/joel-skel.pak"),
    ("jordan", "world-patrol-chalet/actor97/jordan-skel.pak"),
    ("leah", "world-patrol-jackson/actor97/leah-skel.pak"),
    ("lev", "world-saving-kids/actor97/lev-skel.pak"),
    ("lev-jacket-cloth", "sp-common/actor97/lev-jacket-cloth-skel.pak"),
    ("light", "common/actor97/light-skel.pak"),
    ("manny", "world-patrol-jackson/actor97/manny-skel.pak"),
    ("manual-upgrade", "world-seattle-arrival/actor97/manual-upgrade-skel.pak"),
    ("manual-upgrade-magazine-righthand", "common/actor97/manual-upgrade-magazine-righthand-skel.pak"),
    ("maria", "world-flashback-guitar/actor97/maria-skel.pak"),
    ("marlene", "world-abby-flashback-dad/actor97/marlene-skel.pak"),
    ("med-hosp-female-a", "world-medicine/actor97/med-hosp-skeleton-female-a.pak"),
    ("med-hosp-male-a", "world-find-nora/actor97/med-hosp-skeleton-male-a.pak"),
    ("mel", "world-patrol-jackson/actor97/mel-skel.pak"),
    ("mike", "world-seattle-arrival/actor97/mike-skel.pak"),
    ("military-truck-modern", "world-flooded-city/actor97/military-truck-modern-skel.pak"),
    ("militia-mannysdad", "world-forward-base/actor97/militia-mannysdad-skel.pak"),
    ("militia-whitney", "world-find-nora/actor97/militia-whitney-skel.pak"),
    ("nick", "world-patrol-jackson/actor97/nick-skel.pak"),
    ("nora", "world-patrol-jackson/actor97/nora-skel.pak"),
    ("npc-brute", "world-find-nora/actor97/npc-brute-skel.pak"),
    ("npc-normal", "world-patrol-jackson/actor97/npc-normal-skel.pak"),
    ("owen", "world-patrol-jackson/actor97/owen-skel.pak"),
    ("prisoner-ian", "world-santa-barbara/actor97/prisoner-ian-skel.pak"),
    ("ratking-bloater", "world-medicine/actor97/ratking-bloater-skel.pak"),
    ("ratking-stalker", "world-medicine/actor97/ratking-stalker-skel.pak"),
    ("ratking-stalker-scaled", "world-medicine/actor97/ratking-stalker-scaled-skel.pak"),
    ("rifle-strap-inspect", "world-seattle-arrival/actor97/rifle-strap-inspect-skel.pak"),
    ("rope14m", "world-tracking/actor97/rope14m-skel.pak"),
    ("scar-chris", "world-forward-base/actor97/scar-chris-skel.pak"),
    ("scar-colin", "world-abby-fights-militia/actor97/scar-colin-skel.pak"),
    ("scar-emily", "world-forward-base/actor97/scar-emily-skel.pak"),
    ("scar-reuben", "world-saving-kids/actor97/scar-reuben-skel.pak"),
    ("sea-lion", "world-forward-base/actor97/sea-lion-skel.pak"),
    ("seth", "world-patrol-jackson/actor97/seth-skel.pak"),
    ("shambler", "world-watchtower/actor97/shambler-skel.pak"),
    ("sheep-adult", "world-forward-base/actor97/sheep-adult-skel.pak"),
    ("sheep-lamb", "world-farm/actor97/sheep-lamb-skel.pak"),
    ("slaver-matthew", "world-santa-barbara/actor97/slaver-matthew-skel.pak"),
    ("slaver-ryan", "world-santa-barbara/actor97/slaver-ryan-skel.pak"),
    ("t1-npc-normal-old", "world-flashback-guitar/actor97/t1-npc-normal-skel-old.pak"),
    ("tommy", "world-flashback-guitar/actor97/tommy-skel.pak"),
    ("yara", "world-saving-kids/actor97/yara-skel.pak"),
    ("young-abby", "world-flooded-city/actor97/young-abby-skel.pak"),
    ("zebra", "world-abby-flashback-dad/actor97/zebra-skel.pak"),
    ("zebra-baby", "world-abby-flashback-dad/actor97/zebra-baby-skel.pak"),
];
/// `(hint, path relative to the game root)` pairs for `game`
pub fn hints(game: Game) -> &'static [(&'static str, &'static str)] {
    match game {
        Game::Uncharted4 => U4_HINTS,
        Game::LostLegacy => TLL_HINTS,
        Game::LastOfUsPart1 => TLOUP1_HINTS,
        Game::LastOfUs2 => TLOU2_HINTS,
    }
}

/// Longest hint contained in the lowercased `file_name`; ties keep table order
pub fn best_hint(game: Game, file_name: &str) -> Option<(&'static str, &'static str)> {
    let lower = file_name.to_lowercase();
    hints(game)
        .iter()
        .filter(|(hint, _)| lower.contains(hint))
        .fold(None, |best: Option<(&str, &str)>, &(hint, path)| match best {
            Some((b, _)) if b.len() >= hint.len() => best,
            _ => Some((hint, path)),
        })
}

fn sibling(pak_path: &Path, suffix: &str) -> PathBuf {
    let name = pak_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".pak").unwrap_or(&name);
    pak_path.with_file_name(format!("{stem}{suffix}"))
}

/// `foo.pak` to `foo.NEW.pak`
pub fn rewritten_name(path: &Path) -> PathBuf {
    sibling(path, ".NEW.pak")
}

/// Every path worth trying, most specific first
pub fn candidates(pak_path: &Path, options: &PakOptions, purpose: SkeletonPurpose) -> Vec<PathBuf> {
    let base = options.resolve_base_directory(Some(pak_path));
    let mut out = Vec::new();

    if let Some(explicit) = &options.base_skeleton {
        if explicit.is_absolute() {
            out.push(explicit.clone());
        } else {
            if let Some(base) = &base {
                out.push(base.join(explicit));
            }
            if let Some(dir) = pak_path.parent() {
                out.push(dir.join(explicit));
            }
        }
    }

    let file_name = pak_path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if let (Some((hint, path)), Some(base)) = (best_hint(options.game, &file_name), &base) {
        tracing::debug!(hint, path, "base skeleton hint");
        out.push(base.join(path));
    }

    out.push(match purpose {
        SkeletonPurpose::Load => sibling(pak_path, ".skel.pak"),
        SkeletonPurpose::Write => sibling(pak_path, "-base.pak"),
    });

    if purpose == SkeletonPurpose::Load {
        // a skeleton rewritten by bone injection takes precedence
        out = out
            .into_iter()
            .flat_map(|p| [rewritten_name(&p), p])
            .collect();
    }
    out
}

/// First candidate that exists on disk
pub fn locate(pak_path: &Path, options: &PakOptions, purpose: SkeletonPurpose) -> ParseResult<PathBuf> {
    let candidates = candidates(pak_path, options, purpose);
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ParseError::MissingBaseSkeleton {
            path: candidates
                .iter()
                .rev()
                .find(|p| !p.to_string_lossy().ends_with(".NEW.pak"))
                .unwrap_or(&pak_path.to_path_buf())
                .display()
                .to_string(),
        })
}

/// Loads base-skeleton containers once per path
#[derive(Default)]
pub struct BaseSkeletonResolver {
    cache: RwLock<HashMap<PathBuf, Arc<PakContainer>>>,
}

impl BaseSkeletonResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path`, or return the cached container
    pub fn load(&self, path: &Path, options: &PakOptions) -> ParseResult<Arc<PakContainer>> {
        if let Some(pak) = self.cache.read().get(path) {
            return Ok(Arc::clone(pak));
        }
        let mut skeleton_options = options.clone();
        skeleton_options.load_base_skeleton = false;
        skeleton_options.load_textures = false;
        let pak = Arc::new(PakContainer::open(path, &skeleton_options)?);
        if pak.skeleton.is_none() {
            return Err(ParseError::MissingBaseSkeleton {
                path: format!("{} (no joint hierarchy)", path.display()),
            });
        }
        tracing::info!(path = %path.display(), bones = pak.bone_count(), "loaded base skeleton");
        self.cache.write().insert(path.to_path_buf(), Arc::clone(&pak));
        Ok(pak)
    }

    /// Locate and load the base skeleton for the container at `pak_path`
    pub fn resolve(&self, pak_path: &Path, options: &PakOptions, purpose: SkeletonPurpose) -> ParseResult<Arc<PakContainer>> {
        let path = locate(pak_path, options, purpose)?;
        self.load(&path, options)
    }

    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

#[cfg(test)]
mod test_skeleton {
    use super::*;

    #[test]
    fn test_longest_hint_wins() {
        assert_eq!(best_hint(Game::LastOfUs2, "abby-prisoner-body.pak").map(|h| h.0), Some("abby-prisoner"));
        assert_eq!(best_hint(Game::LastOfUs2, "ABBY-coat.pak").map(|h| h.0), Some("abby"));
        assert_eq!(best_hint(Game::Uncharted4, "hero-shirt.pak").map(|h| h.1), Some("actor77/proto.pak"));
        assert_eq!(best_hint(Game::LastOfUsPart1, "joel-body.pak").map(|h| h.1), Some("sp-common/actor97/t1x-joel-skel.pak"));
        assert_eq!(best_hint(Game::Uncharted4, "crate.pak").map(|h| h.0), None);
    }

    #[test]
    fn test_sibling_guesses() {
        let options = PakOptions::default();
        let load = candidates(Path::new("/x/actor77/thing.pak"), &options, SkeletonPurpose::Load);
        assert_eq!(load.last(), Some(&PathBuf::from("/x/actor77/thing.skel.pak")));
        assert!(load.contains(&PathBuf::from("/x/actor77/thing.skel.NEW.pak")));
        let write = candidates(Path::new("/x/actor77/thing.pak"), &options, SkeletonPurpose::Write);
        assert_eq!(write, vec![PathBuf::from("/x/actor77/thing-base.pak")]);
    }

    #[test]
    fn test_locate_reports_missing() {
        let options = PakOptions::default();
        let err = locate(Path::new("/nonexistent/actor77/thing.pak"), &options, SkeletonPurpose::Write).unwrap_err();
        assert!(matches!(err, ParseError::MissingBaseSkeleton { ref path } if path.ends_with("thing-base.pak")));
    }

    #[test]
    fn test_locate_finds_hinted_file() {
        let dir = tempfile::tempdir().unwrap();
        let actor = dir.path().join("actor77");
        std::fs::create_dir_all(&actor).unwrap();
        std::fs::write(actor.join("proto.pak"), b"stub").unwrap();
        let options = PakOptions::default().with_base_directory(dir.path());
        let found = locate(&actor.join("hero-legs.pak"), &options, SkeletonPurpose::Load).unwrap();
        assert_eq!(found, actor.join("proto.pak"));
    }
}
