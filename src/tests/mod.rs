
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::DatasetConfig;
use crate::corpus::Corpus;

/// A small IMDb-style dataset in the shape the default cleaning rules expect.
pub const MOVIES_CSV: &str = "\
,Movie Name,Year of Release,Watch Time,Movie Rating,Meatscore of movie,Votes,Gross,Description,Genre
0,Interstellar,(2014),169 min,8.6,74,\"1,900,000\",$188.02M,Explorers travel through a wormhole in space to save humanity,Sci-Fi
1,Gravity,(2013),91 min,7.7,96,\"850,000\",$274.09M,Two astronauts stranded in space after debris destroys their shuttle,Sci-Fi
2,Ratatouille,(2007),111 min,8.1,96,\"780,000\",$206.45M,A rat who dreams of cooking in a Paris restaurant,Animation
3,The Martian,(2015),144 min,8.0,80,\"900,000\",$228.43M,An astronaut stranded on Mars survives by growing food in space,Sci-Fi
4,Chef,(2014),114 min,7.3,68,\"210,000\",$31.39M,A chef starts a food truck and rediscovers cooking,Comedy
5,Gravity,(2013),91 min,7.7,****,\"850,000\",,Duplicate row for an existing title,Sci-Fi
6,Untitled Project,,,,,,,,
";

pub fn write_movies(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("movies.csv");
    std::fs::write(&path, MOVIES_CSV).unwrap();
    path
}

pub fn movies() -> Corpus {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(MOVIES_CSV.as_bytes());
    Corpus::from_reader(reader, &DatasetConfig::default()).unwrap()
}

pub fn display() -> BTreeMap<String, String> {
    DatasetConfig::default().display
}
