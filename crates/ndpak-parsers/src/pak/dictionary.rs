// ndpak-parsers/src/pak/dictionary.rs
//! Big texture dictionaries shared across containers.
//!
//! A JSON index maps content hashes to VRAM item offsets inside dictionary
//! files. Lookups read one fixed-size record and the pixel data with
//! positioned reads instead of parsing the dictionary container.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ndpak_core::Game;
use serde::{Deserialize, Serialize};

use super::header::field;
use super::vram::VramInfo;
use super::PakContainer;
use crate::config::PakOptions;
use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};

/// Bytes read at a dictionary item offset
pub const DICTIONARY_RECORD_SIZE: u64 = 1024;
/// World name used by titles with a single dictionary folder
pub const SHARED_WORLD: &str = "All";

type FileIndex = BTreeMap<String, BTreeMap<String, u64>>;

/// `{game: {world: {file: {hash: itemOffset}}}}`, hashes as decimal strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureHashIndex {
    games: BTreeMap<String, BTreeMap<String, FileIndex>>,
}

impl TextureHashIndex {
    pub fn load(path: &Path) -> ParseResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> ParseResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn insert(&mut self, game: Game, world: &str, file: &str, hash: u64, item_offset: u64) {
        self.games
            .entry(game.code().to_string())
            .or_default()
            .entry(world.to_string())
            .or_default()
            .entry(file.to_string())
            .or_default()
            .insert(hash.to_string(), item_offset);
    }

    pub fn contains_file(&self, game: Game, world: &str, file: &str) -> bool {
        self.games
            .get(game.code())
            .and_then(|worlds| worlds.get(world))
            .is_some_and(|files| files.contains_key(file))
    }

    /// Every `(world, file, itemOffset)` holding `hash`, in key order
    pub fn lookup(&self, game: Game, hash: u64) -> Vec<(&str, &str, u64)> {
        let key = hash.to_string();
        let mut hits = Vec::new();
        if let Some(worlds) = self.games.get(game.code()) {
            for (world, files) in worlds {
                for (file, hashes) in files {
                    if let Some(offset) = hashes.get(&key) {
                        hits.push((world.as_str(), file.as_str(), *offset));
                    }
                }
            }
        }
        hits
    }

    pub fn texture_count(&self, game: Game) -> usize {
        self.games
            .get(game.code())
            .map_or(0, |worlds| worlds.values().flat_map(|f| f.values()).map(BTreeMap::len).sum())
    }
}

/// Where a dictionary file lives under the game root
pub fn dictionary_path(base: &Path, game: Game, world: &str, file: &str) -> PathBuf {
    if game.is_uncharted() {
        base.join("texturedict2").join(file)
    } else {
        base.join(world).join("texturedict3").join(file)
    }
}

/// Known raw-data starts of shipped dictionary files
pub fn raw_data_start(game: Game, world: &str, file: &str) -> Option<u64> {
    RAW_DATA_STARTS
        .iter()
        .find(|(g, w, f, _)| *g == game.code() && *w == world && *f == file)
        .map(|row| row.3)
}

/// Raw-data start computed from a dictionary's last page row
pub fn compute_raw_data_start<R: Read + Seek>(reader: &mut R) -> ParseResult<u64> {
    let mut header = [0u8; 0x18];
    reader.seek(SeekFrom::Start(0))?;
    reader.read_exact(&mut header)?;
    let cursor = ByteCursor::new(&header);
    let page_count = cursor.read_u32_at(field::PAGE_COUNT)?;
    let page_table = cursor.read_u32_at(field::PAGE_TABLE)?;
    if page_count == 0 {
        return Err(ParseError::InvalidStructure("dictionary has no pages".into()));
    }
    let mut row = [0u8; 8];
    reader.seek(SeekFrom::Start(u64::from(page_table) + 12 * u64::from(page_count - 1)))?;
    reader.read_exact(&mut row)?;
    let cursor = ByteCursor::new(&row);
    Ok(u64::from(cursor.read_u32_at(0)?) + u64::from(cursor.read_u32_at(4)?))
}

/// A dictionary entry that exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryHit {
    pub world: String,
    pub file: String,
    pub path: PathBuf,
    pub item_offset: u64,
}

/// Hash index bound to one game install
#[derive(Debug, Clone)]
pub struct TextureDictionary {
    pub game: Game,
    pub base_directory: PathBuf,
    pub index: TextureHashIndex,
}

impl TextureDictionary {
    pub fn new(game: Game, base_directory: impl Into<PathBuf>, index: TextureHashIndex) -> Self {
        Self {
            game,
            base_directory: base_directory.into(),
            index,
        }
    }

    /// Dictionary configured by `options`, if it names both an index and a game root
    pub fn from_options(options: &PakOptions, pak_path: Option<&Path>) -> ParseResult<Option<Self>> {
        let (Some(index_path), Some(base)) = (
            options.texture_hash_index.as_ref(),
            options.resolve_base_directory(pak_path),
        ) else {
            return Ok(None);
        };
        let index = TextureHashIndex::load(index_path)?;
        Ok(Some(Self::new(options.game, base, index)))
    }

    /// First indexed dictionary file holding `hash` that exists on disk
    pub fn find(&self, hash: u64) -> Option<DictionaryHit> {
        for (world, file, item_offset) in self.index.lookup(self.game, hash) {
            let path = dictionary_path(&self.base_directory, self.game, world, file);
            if path.is_file() {
                return Some(DictionaryHit {
                    world: world.to_string(),
                    file: file.to_string(),
                    path,
                    item_offset,
                });
            }
            tracing::warn!(path = %path.display(), "texture hash indexed but dictionary file is missing");
        }
        None
    }

    /// Descriptor and pixel bytes of a hit
    pub fn read_texture(&self, hit: &DictionaryHit) -> ParseResult<(VramInfo, Vec<u8>)> {
        let mut file = File::open(&hit.path)?;
        let mut record = Vec::with_capacity(DICTIONARY_RECORD_SIZE as usize);
        file.seek(SeekFrom::Start(hit.item_offset))?;
        (&mut file).take(DICTIONARY_RECORD_SIZE).read_to_end(&mut record)?;
        let info = VramInfo::read(&record, 0)?;

        let start = match raw_data_start(self.game, &hit.world, &hit.file) {
            Some(start) => start,
            None => compute_raw_data_start(&mut file)?,
        };
        let mut data = vec![0u8; info.size as usize];
        file.seek(SeekFrom::Start(start + u64::from(info.data_offset)))?;
        file.read_exact(&mut data)?;
        Ok((info, data))
    }
}

/// What [`dump_texture_hashes`] indexed
#[derive(Debug, Clone, Default, Serialize)]
pub struct DumpSummary {
    pub files: usize,
    pub textures: usize,
    /// `(world, file, rawDataStart)` of every indexed file
    pub raw_data_starts: Vec<(String, String, u64)>,
}

/// Scan a game root for dictionary files and add their VRAM hashes to `index`.
///
/// Files already present in the index are skipped.
pub fn dump_texture_hashes(
    game_dir: &Path,
    options: &PakOptions,
    index: &mut TextureHashIndex,
) -> ParseResult<DumpSummary> {
    let game = options.game;
    let mut summary = DumpSummary::default();

    let mut folders: Vec<(String, PathBuf, &str)> = Vec::new();
    if game.is_uncharted() {
        folders.push((SHARED_WORLD.to_string(), game_dir.join("texturedict2"), "global-dict"));
    } else {
        for entry in sorted_dir(game_dir)? {
            let dict_dir = entry.join("texturedict3");
            if dict_dir.is_dir() {
                let world = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                folders.push((world, dict_dir, "-dict"));
            }
        }
    }

    for (world, dir, pattern) in folders {
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "dictionary folder not found");
            continue;
        }
        for path in sorted_dir(&dir)? {
            let Some(file) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !file.contains(pattern) || index.contains_file(game, &world, &file) {
                continue;
            }
            tracing::info!(file = %path.display(), "indexing dictionary");
            let pak = match PakContainer::open(&path, options) {
                Ok(pak) => pak,
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unreadable dictionary");
                    continue;
                }
            };
            for vram in pak.vrams().iter() {
                index.insert(game, &world, &file, vram.hash, vram.item_offset);
                summary.textures += 1;
            }
            summary.files += 1;
            summary
                .raw_data_starts
                .push((world.clone(), file, pak.pages().raw_data_start()));
        }
    }
    Ok(summary)
}

fn sorted_dir(dir: &Path) -> ParseResult<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

const RAW_DATA_STARTS: &[(&str, &str, &str, u64)] = &[
    ("U4", "All", "global-dict.pak", 940048),
    ("U4", "All", "global-dict-1.pak", 1083904),
    ("U4", "All", "global-dict-2.pak", 959456),
    ("U4", "All", "global-dict-3.pak", 1041088),
    ("U4", "All", "global-dict-4.pak", 924576),
    ("U4", "All", "global-dict-5.pak", 1013456),
    ("U4", "All", "global-dict-6.pak", 781216),
    ("U4", "All", "global-dict-7.pak", 740640),
    ("U4", "All", "global-dict-8.pak", 853104),
    ("U4", "All", "global-dict-9.pak", 551888),
    ("U4", "All", "global-dict-10.pak", 301056),
    ("U4", "All", "global-dict-11.pak", 923936),
    ("U4", "All", "global-dict-12.pak", 850656),
    ("U4", "All", "global-dict-13.pak", 839584),
    ("U4", "All", "global-dict-14.pak", 229456),
    ("U4", "All", "global-dict-15.pak", 227216),
    ("U4", "All", "global-dict-16.pak", 277968),
    ("U4", "All", "global-dict-17.pak", 192960),
    ("U4", "All", "global-dict-18.pak", 448832),
    ("U4", "All", "global-dict-19.pak", 506752),
    ("U4", "All", "global-dict-20.pak", 391920),
    ("TLL", "All", "global-dict.pak", 1040608),
    ("TLL", "All", "global-dict-1.pak", 949568),
    ("TLL", "All", "global-dict-2.pak", 1081104),
    ("TLL", "All", "global-dict-3.pak", 574688),
    ("TLL", "All", "global-dict-4.pak", 748944),
    ("TLL", "All", "global-dict-5.pak", 546608),
    ("TLL", "All", "global-dict-6.pak", 1074032),
    ("TLL", "All", "global-dict-7.pak", 911984),
    ("TLL", "All", "global-dict-8.pak", 247632),
    ("TLL", "All", "global-dict-9.pak", 131072),
    ("TLL", "All", "global-dict-10.pak", 140048),
    ("TLL", "All", "global-dict-11.pak", 488656),
    ("TLL", "All", "global-dict-12.pak", 79440),
    ("TLOUP1", "common", "common-dict.pak", 490768),
    ("TLOUP1", "sp-common", "sp-common-dict-1.pak", 1308752),
    ("TLOUP1", "sp-common", "sp-common-dict-2.pak", 1312512),
    ("TLOUP1", "sp-common", "sp-common-dict-3.pak", 1179152),
    ("TLOUP1", "sp-common", "sp-common-dict.pak", 1568992),
    ("TLOUP1", "world-bills", "world-bills-dict-1.pak", 707792),
    ("TLOUP1", "world-bills", "world-bills-dict.pak", 1335136),
    ("TLOUP1", "world-game-start", "world-game-start-dict.pak", 41680),
    ("TLOUP1", "world-home", "world-home-dict-1.pak", 1099808),
    ("TLOUP1", "world-home", "world-home-dict-2.pak", 248576),
    ("TLOUP1", "world-home", "world-home-dict.pak", 1250192),
    ("TLOUP1", "world-hunter-city", "world-hunter-city-dict-1.pak", 1020592),
    ("TLOUP1", "world-hunter-city", "world-hunter-city-dict-2.pak", 316576),
    ("TLOUP1", "world-hunter-city", "world-hunter-city-dict-3.pak", 1371984),
    ("TLOUP1", "world-hunter-city", "world-hunter-city-dict-4.pak", 17552),
    ("TLOUP1", "world-hunter-city", "world-hunter-city-dict.pak", 1406560),
    ("TLOUP1", "world-lab", "world-lab-dict.pak", 329248),
    ("TLOUP1", "world-lakeside", "world-lakeside-dict-1.pak", 481088),
    ("TLOUP1", "world-lakeside", "world-lakeside-dict.pak", 1212656),
    ("TLOUP1", "world-mall", "world-mall-dict-1.pak", 1084928),
    ("TLOUP1", "world-mall", "world-mall-dict-2.pak", 209008),
    ("TLOUP1", "world-mall", "world-mall-dict.pak", 1378112),
    ("TLOUP1", "world-military-city", "world-military-city-dict-1.pak", 1205728),
    ("TLOUP1", "world-military-city", "world-military-city-dict-2.pak", 634832),
    ("TLOUP1", "world-military-city", "world-military-city-dict.pak", 1291008),
    ("TLOUP1", "world-outskirts", "world-outskirts-dict-1.pak", 686208),
    ("TLOUP1", "world-outskirts", "world-outskirts-dict-2.pak", 689200),
    ("TLOUP1", "world-outskirts", "world-outskirts-dict.pak", 1352992),
    ("TLOUP1", "world-suburbs", "world-suburbs-dict-1.pak", 229472),
    ("TLOUP1", "world-suburbs", "world-suburbs-dict.pak", 1078272),
    ("TLOUP1", "world-tommys-dam", "world-tommys-dam-dict-1.pak", 422544),
    ("TLOUP1", "world-tommys-dam", "world-tommys-dam-dict.pak", 810576),
    ("TLOUP1", "world-university", "world-university-dict.pak", 301072),
    ("TLOUP1", "world-wild", "world-wild-dict.pak", 440240),
    ("TLOU2", "common", "common-dict.pak", 617216),
    ("TLOU2", "sp-common", "sp-common-dict.pak", 1117024),
    ("TLOU2", "world-abby-ellie-fight", "world-abby-ellie-fight-dict.pak", 328144),
    ("TLOU2", "world-abby-fights-militia", "world-abby-fights-militia-dict.pak", 535872),
    ("TLOU2", "world-abby-flashback-dad", "world-abby-flashback-dad-dict.pak", 323760),
    ("TLOU2", "world-amputation", "world-amputation-dict.pak", 274256),
    ("TLOU2", "world-ellie-flashback-museum", "world-ellie-flashback-museum-dict.pak", 508400),
    ("TLOU2", "world-ellie-flashback-patrol", "world-ellie-flashback-patrol-dict.pak", 252752),
    ("TLOU2", "world-ellie-flashback-ultimatum", "world-ellie-flashback-ultimatum-dict.pak", 198304),
    ("TLOU2", "world-epilogue", "world-epilogue-dict.pak", 12448),
    ("TLOU2", "world-farm", "world-farm-dict.pak", 617776),
    ("TLOU2", "world-find-aquarium", "world-find-aquarium-dict.pak", 205712),
    ("TLOU2", "world-find-nora", "world-find-nora-dict-1.pak", 548432),
    ("TLOU2", "world-find-nora", "world-find-nora-dict.pak", 1065968),
    ("TLOU2", "world-flashback-guitar", "world-flashback-guitar-dict-1.pak", 1639248),
    ("TLOU2", "world-flashback-guitar", "world-flashback-guitar-dict-2.pak", 148448),
    ("TLOU2", "world-flashback-guitar", "world-flashback-guitar-dict.pak", 1811392),
    ("TLOU2", "world-flooded-city", "world-flooded-city-dict.pak", 1540400),
    ("TLOU2", "world-forward-base", "world-forward-base-dict-1.pak", 858688),
    ("TLOU2", "world-forward-base", "world-forward-base-dict.pak", 1570704),
    ("TLOU2", "world-game-start", "world-game-start-dict.pak", 544),
    ("TLOU2", "world-jordan-escape", "world-jordan-escape-dict.pak", 1065920),
    ("TLOU2", "world-medicine", "world-medicine-dict-1.pak", 291872),
    ("TLOU2", "world-medicine", "world-medicine-dict.pak", 1281248),
    ("TLOU2", "world-patrol", "world-patrol-dict.pak", 1046272),
    ("TLOU2", "world-patrol-chalet", "world-patrol-chalet-dict.pak", 380128),
    ("TLOU2", "world-patrol-departure", "world-patrol-departure-dict.pak", 259680),
    ("TLOU2", "world-patrol-jackson", "world-patrol-jackson-dict.pak", 1737472),
    ("TLOU2", "world-rescue-jesse", "world-rescue-jesse-dict.pak", 1281008),
    ("TLOU2", "world-santa-barbara", "world-santa-barbara-dict.pak", 1102624),
    ("TLOU2", "world-save-lev", "world-save-lev-dict.pak", 909840),
    ("TLOU2", "world-saving-kids", "world-saving-kids-dict.pak", 655632),
    ("TLOU2", "world-seattle-arrival", "world-seattle-arrival-dict.pak", 1914512),
    ("TLOU2", "world-theater", "world-theater-dict.pak", 200752),
    ("TLOU2", "world-theater-ambush", "world-theater-ambush-dict.pak", 138256),
    ("TLOU2", "world-tracking", "world-tracking-dict.pak", 656848),
    ("TLOU2", "world-tracking-horde", "world-tracking-horde-dict.pak", 257840),
    ("TLOU2", "world-watchtower", "world-watchtower-dict-1.pak", 655024),
    ("TLOU2", "world-watchtower", "world-watchtower-dict.pak", 1854112),
];

#[cfg(test)]
mod test_dictionary {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_static_starts() {
        assert_eq!(raw_data_start(Game::Uncharted4, SHARED_WORLD, "global-dict-1.pak"), Some(1_083_904));
        assert_eq!(raw_data_start(Game::LastOfUs2, "common", "common-dict.pak"), Some(617_216));
        assert_eq!(raw_data_start(Game::LastOfUsPart1, "sp-common", "sp-common-dict.pak"), Some(1_568_992));
        assert_eq!(raw_data_start(Game::LostLegacy, "common", "global-dict.pak"), None);
    }

    #[test]
    fn test_paths_per_title() {
        let base = Path::new("/game");
        assert_eq!(
            dictionary_path(base, Game::LostLegacy, SHARED_WORLD, "global-dict.pak"),
            PathBuf::from("/game/texturedict2/global-dict.pak")
        );
        assert_eq!(
            dictionary_path(base, Game::LastOfUs2, "world-farm", "world-farm-dict.pak"),
            PathBuf::from("/game/world-farm/texturedict3/world-farm-dict.pak")
        );
    }

    #[test]
    fn test_index_lookup_and_json_shape() {
        let mut index = TextureHashIndex::default();
        index.insert(Game::LastOfUs2, "common", "common-dict.pak", 42, 0x800);
        index.insert(Game::LastOfUs2, "world-farm", "world-farm-dict.pak", 7, 0x100);
        assert_eq!(index.lookup(Game::LastOfUs2, 42), vec![("common", "common-dict.pak", 0x800)]);
        assert!(index.lookup(Game::Uncharted4, 42).is_empty());
        assert_eq!(index.texture_count(Game::LastOfUs2), 2);

        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["TLOU2"]["common"]["common-dict.pak"]["42"], 0x800);
    }

    #[test]
    fn test_compute_raw_data_start_from_last_row() {
        let mut data = vec![0u8; 0x40];
        data[0x10..0x14].copy_from_slice(&2u32.to_le_bytes());
        data[0x14..0x18].copy_from_slice(&0x20u32.to_le_bytes());
        // second row at 0x2C
        data[0x2C..0x30].copy_from_slice(&0x400u32.to_le_bytes());
        data[0x30..0x34].copy_from_slice(&0x80u32.to_le_bytes());
        assert_eq!(compute_raw_data_start(&mut Cursor::new(data)).unwrap(), 0x480);
    }

    #[test]
    fn test_find_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = TextureHashIndex::default();
        index.insert(Game::Uncharted4, SHARED_WORLD, "global-dict.pak", 9, 0x40);
        let dictionary = TextureDictionary::new(Game::Uncharted4, dir.path(), index);
        assert!(dictionary.find(9).is_none());

        std::fs::create_dir_all(dir.path().join("texturedict2")).unwrap();
        std::fs::write(dir.path().join("texturedict2/global-dict.pak"), [0u8; 16]).unwrap();
        let hit = dictionary.find(9).unwrap();
        assert_eq!(hit.item_offset, 0x40);
        assert_eq!(hit.world, SHARED_WORLD);
    }
}
