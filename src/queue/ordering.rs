use crate::state::models::{QueueRecord, QueuedSong, SimpleSong, SongUpdate};

impl QueueRecord {
    /// Adds `delta` to a queued song, inserting it first if needed, then
    /// restores queue order.
    pub fn upsert(&mut self, update: &SongUpdate, delta: i64) {
        match self.songs.iter_mut().find(|q| q.song.id == update.id) {
            Some(queued) => queued.votes += delta,
            None => {
                let sequence = self.take_sequence();
                self.songs.push(QueuedSong {
                    song: update.to_song(),
                    votes: delta,
                    sequence,
                });
            }
        }
        self.sort();
    }

    /// Votes descending, earliest insertion first on ties.
    pub fn sort(&mut self) {
        self.songs
            .sort_by(|a, b| b.votes.cmp(&a.votes).then(a.sequence.cmp(&b.sequence)));
    }

    pub fn pop_head(&mut self) -> Option<QueuedSong> {
        if self.songs.is_empty() {
            None
        } else {
            Some(self.songs.remove(0))
        }
    }

    /// Puts back a song taken by [`QueueRecord::pop_head`], keeping its
    /// votes and original insertion order.
    pub fn restore(&mut self, queued: QueuedSong) {
        if let Some(existing) = self.songs.iter_mut().find(|q| q.song.id == queued.song.id) {
            existing.votes += queued.votes;
            existing.sequence = existing.sequence.min(queued.sequence);
        } else {
            self.songs.push(queued);
        }
        self.sort();
    }

    /// Replaces the whole queue, keeping sequence numbers monotonic.
    pub fn replace(&mut self, songs: Vec<(SimpleSong, i64)>) {
        self.songs.clear();
        for (song, votes) in songs {
            let sequence = self.take_sequence();
            self.songs.push(QueuedSong {
                song,
                votes,
                sequence,
            });
        }
        self.sort();
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}
