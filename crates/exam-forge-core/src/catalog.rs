//! Static course catalog: subjects, topics, lecture tags and the weighted
//! plan tables for both generation jobs.
//!
//! Everything here is immutable `static` data. The plan tables are the
//! source of checkpoint sequence numbers (see [`crate::plan`]), so editing
//! them renumbers every later artifact.

use crate::plan::{PlanTables, Tier};

pub const SUBJECTS: [&str; 4] = ["Virtualization", "Concurrency", "File Systems", "Disks"];

pub const DIFFICULTIES: [&str; 3] = ["Easy", "Medium", "Hard"];

pub const QUESTION_TYPES: [&str; 3] = ["MultipleChoice", "Open", "CodeAnalysis"];

/// Subject of a topic that has no better match.
pub const DEFAULT_SUBJECT: &str = "Virtualization";

/// Topic to subject, in lookup order. Compound hints resolve to the first
/// topic in this list that they contain.
static TOPIC_SUBJECTS: &[(&str, &str)] = &[
    ("Processes", "Virtualization"),
    ("Threads", "Virtualization"),
    ("Context Switching", "Virtualization"),
    ("System Calls", "Virtualization"),
    ("Signals", "Virtualization"),
    ("CPU Scheduling", "Virtualization"),
    ("Scheduling", "Virtualization"),
    ("Memory Management", "Virtualization"),
    ("Virtual Memory", "Virtualization"),
    ("Paging", "Virtualization"),
    ("Page Replacement", "Virtualization"),
    ("TLB", "Virtualization"),
    ("Copy-on-Write", "Virtualization"),
    ("IPC", "Virtualization"),
    ("Synchronization", "Concurrency"),
    ("Mutexes", "Concurrency"),
    ("Semaphores", "Concurrency"),
    ("Condition Variables", "Concurrency"),
    ("Atomic Operations", "Concurrency"),
    ("Race Conditions", "Concurrency"),
    ("Deadlocks", "Concurrency"),
    ("Producer-Consumer", "Concurrency"),
    ("Concurrency", "Concurrency"),
    ("File Systems", "File Systems"),
    ("Networking", "File Systems"),
    ("Security", "File Systems"),
    ("Disk Scheduling", "Disks"),
    ("I/O", "Disks"),
    ("RAID", "Disks"),
];

/// Resolve a topic or compound hint ("Paging and TLB") to its subject.
pub fn subject_for_topic(hint: &str) -> &'static str {
    if let Some((_, subject)) = TOPIC_SUBJECTS.iter().find(|(t, _)| *t == hint) {
        return *subject;
    }
    TOPIC_SUBJECTS
        .iter()
        .find(|(t, _)| hint.contains(t))
        .map(|(_, s)| *s)
        .unwrap_or(DEFAULT_SUBJECT)
}

/// Subject covered by a lecture, or `None` for lectures outside the course
/// map.
pub fn lecture_subject(lecture: i64) -> Option<&'static str> {
    match lecture {
        2..=9 => Some("Virtualization"),
        10..=16 => Some("Concurrency"),
        17..=19 => Some("Disks"),
        20..=22 => Some("File Systems"),
        _ => None,
    }
}

/// Topic tags of a lecture; empty for unknown lectures.
pub fn lecture_topics(lecture: i64) -> &'static [&'static str] {
    match lecture {
        2 => &["Processes", "OS History"],
        3 => &["CPU Scheduling", "Scheduling Algorithms"],
        4 => &["System Calls", "POSIX API", "Process Trees"],
        5 => &["Signals", "Zombie Processes", "Process Lifecycle"],
        6 => &["Memory Management", "Free Lists", "Fragmentation"],
        7 => &["Paging", "Page Tables", "MMU", "Virtual Memory"],
        8 => &["Multi-level Page Tables", "Paging"],
        9 => &["Review", "Processes", "Scheduling", "Paging"],
        10 => &["Threads", "Concurrency", "Multi-core"],
        11 => &["Locks", "Synchronization", "Threads"],
        12 => &["Locks", "Spinning", "Ticket Locks"],
        13 => &["TAS", "TTAS", "Cache Coherence", "Atomic Operations"],
        14 => &["Condition Variables", "Producer-Consumer", "Semaphores"],
        15 => &["Deadlocks", "Lock Ordering"],
        16 => &["Review", "Concurrency", "Deadlocks", "Starvation"],
        17 => &["I/O Devices", "Device Model", "Persistence"],
        18 => &["Hard Disk", "Disk Performance", "Sequential vs Random"],
        19 => &["RAID", "Striping", "Mirroring"],
        20 => &["File Systems", "Inodes", "Data Blocks", "Bitmaps"],
        21 => &["Crash Consistency", "Journaling", "File Systems"],
        22 => &["Log-structured FS", "Inode Map", "File Systems"],
        _ => &[],
    }
}

// ── Exam-style plan ─────────────────────────────────────────────────────────

static EXAM_FULL_TOPICS: &[&str] = &[
    "Processes",
    "Threads",
    "Synchronization",
    "Mutexes",
    "Semaphores",
    "Deadlocks",
    "Memory Management",
    "Virtual Memory",
    "Paging",
    "File Systems",
    "CPU Scheduling",
    "Concurrency",
    "Race Conditions",
];

static EXAM_MEDIUM_TOPICS: &[&str] = &[
    "Context Switching",
    "System Calls",
    "Condition Variables",
    "Producer-Consumer",
    "Page Replacement",
    "TLB",
    "IPC",
    "Signals",
    "Copy-on-Write",
    "Scheduling",
];

static EXAM_LIGHT_TOPICS: &[&str] = &[
    "Atomic Operations",
    "Disk Scheduling",
    "I/O",
    "RAID",
    "Networking",
    "Security",
];

static EXAM_CROSS_COMBOS: &[(&str, &str, &str)] = &[
    ("Synchronization and Deadlocks", "CodeAnalysis", "Hard"),
    ("Synchronization and Deadlocks", "Open", "Hard"),
    ("Paging and TLB", "MultipleChoice", "Medium"),
    ("Paging and TLB", "Open", "Hard"),
    ("Processes and Threads", "MultipleChoice", "Medium"),
    ("Processes and Threads", "Open", "Easy"),
    ("Processes and Threads", "CodeAnalysis", "Hard"),
    ("Semaphores and Producer-Consumer", "CodeAnalysis", "Medium"),
    ("Semaphores and Producer-Consumer", "CodeAnalysis", "Hard"),
    ("Semaphores and Producer-Consumer", "Open", "Medium"),
    ("Memory Management and Page Replacement", "MultipleChoice", "Medium"),
    ("Memory Management and Page Replacement", "Open", "Hard"),
    ("File Systems and I/O", "MultipleChoice", "Medium"),
    ("File Systems and I/O", "Open", "Hard"),
    ("Virtual Memory and Copy-on-Write", "Open", "Medium"),
    ("Virtual Memory and Copy-on-Write", "MultipleChoice", "Hard"),
    ("Race Conditions and Mutexes", "CodeAnalysis", "Medium"),
    ("Race Conditions and Mutexes", "CodeAnalysis", "Hard"),
    ("Concurrency and Condition Variables", "CodeAnalysis", "Medium"),
    ("Concurrency and Condition Variables", "Open", "Hard"),
    ("CPU Scheduling and Context Switching", "MultipleChoice", "Easy"),
    ("CPU Scheduling and Context Switching", "Open", "Medium"),
    ("Deadlocks and Synchronization", "MultipleChoice", "Medium"),
    ("Signals and System Calls", "MultipleChoice", "Medium"),
    ("Signals and System Calls", "Open", "Hard"),
    ("IPC and Processes", "Open", "Medium"),
    ("Threads and Synchronization", "CodeAnalysis", "Medium"),
    ("Threads and Synchronization", "CodeAnalysis", "Hard"),
    ("Scheduling and Deadlocks", "Open", "Hard"),
    ("RAID and File Systems", "MultipleChoice", "Medium"),
    ("Processes and Memory Management", "MultipleChoice", "Easy"),
    ("Processes and Memory Management", "Open", "Medium"),
    ("Processes and Memory Management", "CodeAnalysis", "Hard"),
    ("Threads and Mutexes", "MultipleChoice", "Easy"),
    ("Threads and Mutexes", "CodeAnalysis", "Medium"),
    ("Threads and Mutexes", "Open", "Hard"),
    ("Semaphores and Deadlocks", "MultipleChoice", "Medium"),
    ("Semaphores and Deadlocks", "Open", "Hard"),
    ("Semaphores and Deadlocks", "CodeAnalysis", "Hard"),
    ("Virtual Memory and Paging", "MultipleChoice", "Easy"),
    ("Virtual Memory and Paging", "Open", "Medium"),
    ("Virtual Memory and Paging", "CodeAnalysis", "Hard"),
    ("File Systems and RAID", "MultipleChoice", "Easy"),
    ("File Systems and RAID", "Open", "Medium"),
    ("Scheduling and Processes", "MultipleChoice", "Easy"),
    ("Scheduling and Processes", "Open", "Medium"),
    ("Synchronization and Concurrency", "MultipleChoice", "Easy"),
    ("Synchronization and Concurrency", "CodeAnalysis", "Hard"),
    ("Memory Management and TLB", "MultipleChoice", "Medium"),
    ("Memory Management and TLB", "Open", "Hard"),
    ("Deadlocks and Mutexes", "CodeAnalysis", "Hard"),
    ("Deadlocks and Mutexes", "Open", "Medium"),
    ("IPC and Signals", "MultipleChoice", "Medium"),
    ("IPC and Signals", "Open", "Hard"),
    ("Context Switching and Threads", "MultipleChoice", "Easy"),
];

/// Exam-style plan: 936 + 360 + 90 + 550 = 1936 items.
pub static EXAM_PLAN: PlanTables = PlanTables {
    tiers: &[
        Tier {
            topics: EXAM_FULL_TOPICS,
            dimensions: &["MultipleChoice", "Open", "CodeAnalysis"],
            difficulties: &DIFFICULTIES,
            repeat: 8,
        },
        Tier {
            topics: EXAM_MEDIUM_TOPICS,
            dimensions: &["MultipleChoice", "Open"],
            difficulties: &DIFFICULTIES,
            repeat: 6,
        },
        Tier {
            topics: EXAM_LIGHT_TOPICS,
            dimensions: &["MultipleChoice"],
            difficulties: &DIFFICULTIES,
            repeat: 5,
        },
    ],
    cross: EXAM_CROSS_COMBOS,
    cross_repeat: 10,
};

// ── Lecture-grounded (theory) plan ──────────────────────────────────────────

static VIRTUALIZATION_TOPICS: &[&str] = &[
    "Processes",
    "Process Lifecycle",
    "Context Switching",
    "System Calls",
    "Signals",
    "CPU Scheduling",
    "Scheduling Algorithms",
    "Memory Management",
    "Fragmentation",
    "Virtual Memory",
    "Paging",
    "Page Tables",
    "Multi-level Page Tables",
    "TLB",
    "Copy-on-Write",
    "Address Space",
];

static CONCURRENCY_TOPICS: &[&str] = &[
    "Threads",
    "Multi-core Processors",
    "Locks",
    "Mutexes",
    "Synchronization",
    "Spinlocks",
    "Ticket Locks",
    "TAS and TTAS",
    "Cache Coherence",
    "Atomic Operations",
    "Condition Variables",
    "Producer-Consumer",
    "Semaphores",
    "Deadlocks",
    "Race Conditions",
    "Starvation",
];

static FILE_SYSTEM_TOPICS: &[&str] = &[
    "File System Structure",
    "Inodes",
    "Data Blocks and Bitmaps",
    "Superblock",
    "Directory Structure",
    "Crash Consistency",
    "Journaling",
    "Log-structured File System",
    "Inode Map",
];

static DISK_TOPICS: &[&str] = &[
    "I/O Devices",
    "Device Model",
    "Hard Disk Performance",
    "Sequential vs Random Access",
    "Disk Scheduling",
    "RAID",
    "RAID-0 Striping",
    "RAID-1 Mirroring",
];

static THEORY_CROSS_COMBOS: &[(&str, &str, &str)] = &[
    ("Processes and Scheduling", "Virtualization", "Medium"),
    ("Processes and Scheduling", "Virtualization", "Hard"),
    ("Paging and TLB", "Virtualization", "Medium"),
    ("Paging and TLB", "Virtualization", "Hard"),
    ("Virtual Memory and Page Tables", "Virtualization", "Medium"),
    ("Memory Management and Paging", "Virtualization", "Hard"),
    ("Context Switching and Processes", "Virtualization", "Easy"),
    ("Signals and System Calls", "Virtualization", "Medium"),
    ("Threads and Locks", "Concurrency", "Medium"),
    ("Threads and Locks", "Concurrency", "Hard"),
    ("Deadlocks and Synchronization", "Concurrency", "Hard"),
    ("Semaphores and Producer-Consumer", "Concurrency", "Medium"),
    ("Semaphores and Producer-Consumer", "Concurrency", "Hard"),
    ("Race Conditions and Mutexes", "Concurrency", "Medium"),
    ("Condition Variables and Locks", "Concurrency", "Hard"),
    ("Spinlocks and Cache Coherence", "Concurrency", "Hard"),
    ("Atomic Operations and Synchronization", "Concurrency", "Medium"),
    ("Starvation and Deadlocks", "Concurrency", "Hard"),
    ("Inodes and Data Blocks", "File Systems", "Medium"),
    ("Crash Consistency and Journaling", "File Systems", "Hard"),
    ("Log-structured FS and Inode Map", "File Systems", "Hard"),
    ("File System Structure and Directories", "File Systems", "Easy"),
    ("RAID and Disk Performance", "Disks", "Medium"),
    ("RAID and Disk Performance", "Disks", "Hard"),
    ("I/O Devices and Device Model", "Disks", "Easy"),
    ("Sequential vs Random and Disk Scheduling", "Disks", "Medium"),
];

/// Lecture-grounded multiple-choice plan: 144 + 144 + 108 + 96 + 78 = 570
/// items. Each tier's single dimension is its subject.
pub static THEORY_PLAN: PlanTables = PlanTables {
    tiers: &[
        Tier {
            topics: VIRTUALIZATION_TOPICS,
            dimensions: &["Virtualization"],
            difficulties: &DIFFICULTIES,
            repeat: 3,
        },
        Tier {
            topics: CONCURRENCY_TOPICS,
            dimensions: &["Concurrency"],
            difficulties: &DIFFICULTIES,
            repeat: 3,
        },
        Tier {
            topics: FILE_SYSTEM_TOPICS,
            dimensions: &["File Systems"],
            difficulties: &DIFFICULTIES,
            repeat: 4,
        },
        Tier {
            topics: DISK_TOPICS,
            dimensions: &["Disks"],
            difficulties: &DIFFICULTIES,
            repeat: 4,
        },
    ],
    cross: THEORY_CROSS_COMBOS,
    cross_repeat: 3,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_direct_match() {
        assert_eq!(subject_for_topic("Deadlocks"), "Concurrency");
        assert_eq!(subject_for_topic("RAID"), "Disks");
        assert_eq!(subject_for_topic("Security"), "File Systems");
    }

    #[test]
    fn test_subject_compound_uses_first_listed_topic() {
        // "Context Switching" precedes "CPU Scheduling" in lookup order.
        assert_eq!(subject_for_topic("CPU Scheduling and Context Switching"), "Virtualization");
        assert_eq!(subject_for_topic("Semaphores and Producer-Consumer"), "Concurrency");
        assert_eq!(subject_for_topic("File Systems and I/O"), "File Systems");
    }

    #[test]
    fn test_subject_fallback() {
        assert_eq!(subject_for_topic("Quantum Computing"), DEFAULT_SUBJECT);
    }

    #[test]
    fn test_lecture_maps() {
        assert_eq!(lecture_subject(2), Some("Virtualization"));
        assert_eq!(lecture_subject(16), Some("Concurrency"));
        assert_eq!(lecture_subject(18), Some("Disks"));
        assert_eq!(lecture_subject(22), Some("File Systems"));
        assert_eq!(lecture_subject(1), None);
        assert!(lecture_topics(19).contains(&"RAID"));
        assert!(lecture_topics(40).is_empty());
    }

    #[test]
    fn test_theory_tiers_use_known_subjects() {
        for tier in THEORY_PLAN.tiers {
            assert!(SUBJECTS.contains(&tier.dimensions[0]));
        }
        for (_, subject, diff) in THEORY_PLAN.cross {
            assert!(SUBJECTS.contains(subject));
            assert!(DIFFICULTIES.contains(diff));
        }
    }

    #[test]
    fn test_exam_cross_combos_use_known_types() {
        assert_eq!(EXAM_PLAN.cross.len(), 55);
        for (_, kind, diff) in EXAM_PLAN.cross {
            assert!(QUESTION_TYPES.contains(kind));
            assert!(DIFFICULTIES.contains(diff));
        }
    }
}
