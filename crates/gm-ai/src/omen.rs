//! The omen of a turn: one of the 64 hexagrams, used to steer random events.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const HEXAGRAMS: [&str; 64] = [
    "Qian, the Creative (sublime success through perseverance)",
    "Kun, the Receptive (carry all things with great virtue)",
    "Zhun, Difficulty at the Beginning (every start is hard)",
    "Meng, Youthful Folly (seek instruction)",
    "Xu, Waiting (wait for the right moment)",
    "Song, Conflict (disputes arise)",
    "Shi, the Army (mobilize the masses)",
    "Bi, Holding Together (close alliances)",
    "Xiao Chu, Small Taming (gather strength quietly)",
    "Lu, Treading (tread carefully)",
    "Tai, Peace (heaven and earth in harmony)",
    "Pi, Standstill (channels are blocked)",
    "Tong Ren, Fellowship (common cause with others)",
    "Da You, Great Possession (abundance)",
    "Qian, Modesty (humility brings success)",
    "Yu, Enthusiasm (rally the people)",
    "Sui, Following (adapt to the times)",
    "Gu, Work on the Decayed (repair what was spoiled)",
    "Lin, Approach (a good season approaches)",
    "Guan, Contemplation (observe before acting)",
    "Shi He, Biting Through (decisive judgement)",
    "Bi, Grace (form over substance)",
    "Bo, Splitting Apart (erosion from within)",
    "Fu, Return (the turning point)",
    "Wu Wang, Innocence (the unexpected)",
    "Da Chu, Great Taming (accumulate great strength)",
    "Yi, Nourishment (mind what you take in)",
    "Da Guo, Great Excess (the ridgepole sags)",
    "Kan, the Abysmal (danger upon danger)",
    "Li, the Clinging (clarity and dependence)",
    "Xian, Influence (mutual attraction)",
    "Heng, Duration (persistence)",
    "Dun, Retreat (withdraw in time)",
    "Da Zhuang, Great Power (strength must be restrained)",
    "Jin, Progress (rapid advancement)",
    "Ming Yi, Darkening of the Light (hide your brilliance)",
    "Jia Ren, the Family (order at home)",
    "Kui, Opposition (estrangement)",
    "Jian, Obstruction (obstacles ahead)",
    "Xie, Deliverance (release from hardship)",
    "Sun, Decrease (sacrifice for later gain)",
    "Yi, Increase (gains flow in)",
    "Guai, Breakthrough (resolute action)",
    "Gou, Coming to Meet (an unexpected encounter)",
    "Cui, Gathering Together (people assemble)",
    "Sheng, Pushing Upward (steady ascent)",
    "Kun, Oppression (exhaustion)",
    "Jing, the Well (an inexhaustible source)",
    "Ge, Revolution (radical change)",
    "Ding, the Cauldron (establish the new)",
    "Zhen, the Arousing (shock and thunder)",
    "Gen, Keeping Still (stop and reflect)",
    "Jian, Development (gradual progress)",
    "Gui Mei, the Marrying Maiden (a subordinate position)",
    "Feng, Abundance (the zenith)",
    "Lu, the Wanderer (travel and instability)",
    "Xun, the Gentle (penetrating influence)",
    "Dui, the Joyous (open exchange)",
    "Huan, Dispersion (dissolving barriers)",
    "Jie, Limitation (set boundaries)",
    "Zhong Fu, Inner Truth (sincerity wins trust)",
    "Xiao Guo, Small Excess (attend to small things)",
    "Ji Ji, After Completion (guard what was achieved)",
    "Wei Ji, Before Completion (the task is unfinished)",
];

/// Seed derived from the game id and turn, stable across processes.
pub fn omen_seed(game_id: &str, turn: u64) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    game_id
        .as_bytes()
        .iter()
        .chain(turn.to_le_bytes().iter())
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

/// The hexagram drawn for `turn` of `game_id`. Replaying a round draws the same one.
pub fn draw(game_id: &str, turn: u64) -> &'static str {
    let mut rng = ChaCha8Rng::seed_from_u64(omen_seed(game_id, turn));
    HEXAGRAMS.choose(&mut rng).copied().unwrap_or(HEXAGRAMS[0])
}
